//! Builds the small two-population network the CLI commands exercise
//! (`spec.md` §8 scenario 3's dense static-pulse round-trip, generalised
//! to also accept STDP), grounded in `nirg-ir`'s own `tests::` fixtures
//! (`crates/nirg-ir/src/lib.rs`'s `builds_a_two_population_network_end_to_end`).
//!
//! This is deliberately not a model description file format: the spec
//! leaves the user-facing scripting/bindings layer that would build a
//! model out of scope, so the CLI drives the same built-in model
//! library (`nirg_ir::models`) directly, parameterised by
//! [`crate::config::ModelSettings`].

use std::collections::BTreeMap;

use nirg_ir::{ArrayLocation, ConnectivityInit, MatrixType, Model, NeuronGroup, SpanType, SynapseGroup, VarInit};

use crate::config::{ModelSettings, NeuronKind, PlasticityKind};
use crate::error::{CliError, CliResult};

fn lif_param_values() -> BTreeMap<String, f64> {
    [
        ("C", 1.0),
        ("TauM", 20.0),
        ("Vrest", -70.0),
        ("Vreset", -70.0),
        ("Vthresh", -50.0),
        ("Ioffset", 0.0),
        ("TRefrac", 2.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn izhikevich_param_values() -> BTreeMap<String, f64> {
    [("a", 0.02), ("b", 0.2), ("c", -65.0), ("d", 8.0)].into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn neuron_group(settings: &ModelSettings, name: &str, n: u32) -> CliResult<NeuronGroup> {
    let (model, values) = match settings.neuron {
        NeuronKind::Lif => (nirg_ir::models::lif(), lif_param_values()),
        NeuronKind::Izhikevich => (nirg_ir::models::izhikevich(), izhikevich_param_values()),
    };
    Ok(NeuronGroup::new(name, n, model, values)?)
}

/// Build a `Pre -> Post` model from `settings`, but do not call
/// [`Model::finalise`] — callers decide when to freeze it.
pub fn build(settings: &ModelSettings) -> CliResult<Model> {
    let mut model = Model::new(&settings.name);
    model.config.precision = settings.precision;
    model.config.time_precision = settings.precision;
    model.config.dt = settings.dt;
    model.config.batch_size = settings.batch_size;
    model.config.seed = settings.seed;
    model.config.fuse_postsynaptic_models = settings.fuse_postsynaptic_models;
    model.config.fuse_pre_post_weight_update_models = settings.fuse_pre_post_weight_update_models;

    let pre = model.add_neuron_population(neuron_group(settings, "Pre", settings.pre_neurons)?)?;
    let post = model.add_neuron_population(neuron_group(settings, "Post", settings.post_neurons)?)?;

    let mut weight_var_init = BTreeMap::new();
    weight_var_init.insert("g".to_string(), VarInit::Constant(settings.initial_weight));
    let mut pre_var_init = BTreeMap::new();
    let mut post_var_init = BTreeMap::new();

    let weight_update_model = match settings.plasticity {
        PlasticityKind::Static => nirg_ir::models::static_pulse(),
        PlasticityKind::Stdp => {
            pre_var_init.insert("preTrace".to_string(), VarInit::Constant(0.0));
            post_var_init.insert("postTrace".to_string(), VarInit::Constant(0.0));
            nirg_ir::models::stdp()
        }
    };
    let weight_update_param_values = match settings.plasticity {
        PlasticityKind::Static => BTreeMap::new(),
        PlasticityKind::Stdp => [
            ("tauPlus", 20.0),
            ("tauMinus", 20.0),
            ("Aplus", 0.01),
            ("Aminus", 0.012),
            ("Wmin", 0.0),
            ("Wmax", 1.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect(),
    };

    let synapse = SynapseGroup {
        name: "Pre_Post".to_string(),
        src: pre,
        target: post,
        matrix_type: MatrixType::dense_individual(),
        connectivity: ConnectivityInit::Dense,
        axonal_delay_steps: settings.axonal_delay_steps,
        back_prop_delay_steps: 0,
        max_dendritic_delay_timesteps: 1,
        weight_update_model,
        weight_update_param_values,
        weight_update_derived_param_values: BTreeMap::new(),
        weight_var_init,
        pre_var_init,
        post_var_init,
        postsynaptic_model: nirg_ir::models::delta_curr(),
        postsynaptic_param_values: BTreeMap::new(),
        postsynaptic_derived_param_values: BTreeMap::new(),
        postsynaptic_var_init: BTreeMap::new(),
        kernel_size: None,
        span_type: SpanType::Postsynaptic,
        threads_per_spike: 1,
        narrow_sparse_ind: settings.narrow_sparse_ind,
        pre_target_var: "Isyn".to_string(),
        post_target_var: "Isyn".to_string(),
        sparse_connectivity_location: ArrayLocation::default(),
    };
    model.add_synapse_population(synapse).map_err(CliError::from)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_finalises_the_default_settings() {
        let mut model = build(&ModelSettings::default()).unwrap();
        model.finalise().unwrap();
        assert_eq!(model.neuron_groups().len(), 2);
        assert_eq!(model.synapse_groups().len(), 1);
    }

    #[test]
    fn stdp_plasticity_registers_pre_and_post_traces() {
        let settings = ModelSettings { plasticity: PlasticityKind::Stdp, ..ModelSettings::default() };
        let model = build(&settings).unwrap();
        let sg = &model.synapse_groups()[0];
        assert!(sg.pre_var_init.contains_key("preTrace"));
        assert!(sg.post_var_init.contains_key("postTrace"));
    }
}
