//! End-to-end pipeline scenarios that need more than one kernel pass
//! together to check. The per-pass unit tests beside `kernel::neuron`
//! and `kernel::synapse` already cover the merged-group fusion scenarios
//! in isolation; these exercise `nirg_codegen::generate` as a whole.

use std::collections::BTreeMap;

use nirg_backend::host::HostBackend;
use nirg_ir::{models, ArrayLocation, ConnectivityInit, MatrixType, Model, NeuronGroup, SpanType, SynapseGroup, VarInit};

fn lif_values() -> BTreeMap<String, f64> {
    [("C", 1.0), ("TauM", 20.0), ("Vrest", -70.0), ("Vreset", -70.0), ("Vthresh", -50.0), ("Ioffset", 0.0), ("TRefrac", 2.0)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn dense_static_pulse(src: nirg_ir::NeuronGroupId, target: nirg_ir::NeuronGroupId) -> SynapseGroup {
    let mut weight_var_init = BTreeMap::new();
    weight_var_init.insert("g".to_string(), VarInit::Constant(1.0));
    SynapseGroup {
        name: "N0_N1".to_string(),
        src,
        target,
        matrix_type: MatrixType::dense_individual(),
        connectivity: ConnectivityInit::Dense,
        axonal_delay_steps: 0,
        back_prop_delay_steps: 0,
        max_dendritic_delay_timesteps: 1,
        weight_update_model: models::static_pulse(),
        weight_update_param_values: BTreeMap::new(),
        weight_update_derived_param_values: BTreeMap::new(),
        weight_var_init,
        pre_var_init: BTreeMap::new(),
        post_var_init: BTreeMap::new(),
        postsynaptic_model: models::delta_curr(),
        postsynaptic_param_values: BTreeMap::new(),
        postsynaptic_derived_param_values: BTreeMap::new(),
        postsynaptic_var_init: BTreeMap::new(),
        kernel_size: None,
        span_type: SpanType::Postsynaptic,
        threads_per_spike: 1,
        narrow_sparse_ind: false,
        pre_target_var: "Isyn".to_string(),
        post_target_var: "Isyn".to_string(),
        sparse_connectivity_location: ArrayLocation::default(),
    }
}

/// Scenario 3: N0(10) -> N1(10) DENSE StaticPulse g=1.0, DeltaCurr. The
/// presynaptic kernel must accumulate additively into `inSyn` through a
/// register (dense connectivity never needs an atomic), and the neuron
/// kernel must run DeltaCurr's actual apply-input code, which both applies
/// `inSyn` to `Isyn` and zeroes it back out in the same fragment.
#[test]
fn dense_static_pulse_round_trip_wires_accumulation_through_to_decay() {
    let mut model = Model::new("net");
    let n0 = model.add_neuron_population(NeuronGroup::new("N0", 10, models::lif(), lif_values()).unwrap()).unwrap();
    let n1 = model.add_neuron_population(NeuronGroup::new("N1", 10, models::lif(), lif_values()).unwrap()).unwrap();
    model.add_synapse_population(dense_static_pulse(n0, n1)).unwrap();
    model.finalise().unwrap();

    let backend = HostBackend::default();
    let generated = nirg_codegen::generate(&model, &backend).unwrap();

    assert!(generated.presynaptic_update.source.contains("linSyn += (x)"));
    assert!(generated.neuron_update.source.contains("Isyn += linSyn_N0_N1"));
    assert!(generated.neuron_update.source.contains("linSyn_N0_N1 = 0"));
}

/// An `ExpCurr` postsynaptic model's decay code must also run, baking
/// the archetype's derived `expDecay` in as a compile-time constant
/// (`spec.md` §4.3: fuse-level hashing already folds any param/derived-
/// param a fused PS fragment references into its digest, so every
/// member of a fused bucket is guaranteed to agree on its value).
#[test]
fn exp_curr_decay_code_bakes_in_its_derived_decay_constant() {
    let mut model = Model::new("net");
    let n0 = model.add_neuron_population(NeuronGroup::new("N0", 10, models::lif(), lif_values()).unwrap()).unwrap();
    let n1 = model.add_neuron_population(NeuronGroup::new("N1", 10, models::lif(), lif_values()).unwrap()).unwrap();
    let mut synapse = dense_static_pulse(n0, n1);
    synapse.postsynaptic_model = models::exp_curr();
    synapse.postsynaptic_param_values.insert("tau".to_string(), 5.0);
    model.add_synapse_population(synapse).unwrap();
    model.finalise().unwrap();

    let expected_decay = model.synapse_groups()[0].postsynaptic_derived_param_values["expDecay"];

    let backend = HostBackend::default();
    let generated = nirg_codegen::generate(&model, &backend).unwrap();

    assert!(generated.neuron_update.source.contains("Isyn += linSyn_N0_N1"));
    assert!(generated.neuron_update.source.contains(&format!("linSyn_N0_N1 *= {expected_decay}")));
}

/// Scenario 5 (delay-queue advance arithmetic): axonal delay 3 requires
/// 4 buffered slots, and the write-slot pointer advances modulo that
/// count regardless of how many steps have actually run.
#[test]
fn axonal_delay_of_three_requires_four_delay_slots() {
    let mut model = Model::new("net");
    let src = model.add_neuron_population(NeuronGroup::new("N0", 10, models::lif(), lif_values()).unwrap()).unwrap();
    let target = model.add_neuron_population(NeuronGroup::new("N1", 10, models::lif(), lif_values()).unwrap()).unwrap();
    let mut synapse = dense_static_pulse(src, target);
    synapse.axonal_delay_steps = 3;
    model.add_synapse_population(synapse).unwrap();
    model.finalise().unwrap();

    let num_delay_slots = model.neuron_group(src).num_delay_slots;
    assert_eq!(num_delay_slots, 4);
    let spk_que_ptr_after_ten_steps = 10u64 % num_delay_slots as u64;
    assert_eq!(spk_que_ptr_after_ten_steps, 2);
}
