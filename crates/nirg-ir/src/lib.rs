//! Model intermediate representation: neuron/synapse/current-source/
//! custom-update groups, structural hashing, and validation.
//!
//! This crate owns the network description a caller builds up (the way
//! GeNN's `ModelSpec` is built up) before it is handed to `nirg-codegen`
//! for fusion and code emission. Every user code fragment is scanned
//! exactly once here via [`nirg_transpile::scan`]; downstream crates
//! consult [`CodeTokens`] rather than re-scanning raw strings.

pub mod codetokens;
pub mod connectivity;
pub mod current_source;
pub mod custom_update;
pub mod error;
pub mod hash;
pub mod model;
pub mod models;
pub mod neuron;
pub mod synapse;
pub mod types;

pub use codetokens::CodeTokens;
pub use connectivity::NarrowIndexType;
pub use current_source::{CurrentSource, CurrentSourceModel};
pub use custom_update::{
    CustomConnectivityUpdate, CustomConnectivityUpdateModel, CustomUpdate, CustomUpdateModel, VarRef, VarRefAccess,
    VarRefTarget,
};
pub use error::{IrError, Result};
pub use hash::{DigestBuilder, HashDigest};
pub use model::{CurrentSourceId, CustomConnectivityUpdateId, CustomUpdateId, Model, ModelConfig, NeuronGroupId, SynapseGroupId};
pub use neuron::{DerivedParamFn, NeuronGroup, NeuronModel};
pub use synapse::{ConnectivityInit, PostsynapticModel, SynapseGroup, WeightUpdateModel};
pub use types::{ArrayLocation, ConnectivityKind, MatrixType, NumericType, SpanType, VarAccess, VarInit, VarSpec, WeightStorage};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn builds_a_two_population_network_end_to_end() {
        let mut model = Model::new("tiny_net");

        let mut lif_values = BTreeMap::new();
        for (k, v) in [
            ("C", 1.0),
            ("TauM", 20.0),
            ("Vrest", -70.0),
            ("Vreset", -70.0),
            ("Vthresh", -50.0),
            ("Ioffset", 0.0),
            ("TRefrac", 2.0),
        ] {
            lif_values.insert(k.to_string(), v);
        }
        let pre = model.add_neuron_population(NeuronGroup::new("Pre", 100, models::lif(), lif_values.clone()).unwrap()).unwrap();
        let post = model.add_neuron_population(NeuronGroup::new("Post", 100, models::lif(), lif_values).unwrap()).unwrap();

        let mut weight_var_init = BTreeMap::new();
        weight_var_init.insert("g".to_string(), VarInit::Constant(0.5));
        let synapse = SynapseGroup {
            name: "Pre_Post".to_string(),
            src: pre,
            target: post,
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
        };
        model.add_synapse_population(synapse).unwrap();
        model.finalise().unwrap();

        assert_eq!(model.neuron_groups().len(), 2);
        assert_eq!(model.synapse_groups().len(), 1);
        assert!(model.to_summary().contains("Pre_Post"));
    }

    #[test]
    fn rejects_synapse_targeting_unknown_additional_input_var() {
        let mut model = Model::new("net");
        let mut lif_values = BTreeMap::new();
        for (k, v) in [
            ("C", 1.0),
            ("TauM", 20.0),
            ("Vrest", -70.0),
            ("Vreset", -70.0),
            ("Vthresh", -50.0),
            ("Ioffset", 0.0),
            ("TRefrac", 2.0),
        ] {
            lif_values.insert(k.to_string(), v);
        }
        let pre = model.add_neuron_population(NeuronGroup::new("Pre", 10, models::lif(), lif_values.clone()).unwrap()).unwrap();
        let post = model.add_neuron_population(NeuronGroup::new("Post", 10, models::lif(), lif_values).unwrap()).unwrap();

        let mut weight_var_init = BTreeMap::new();
        weight_var_init.insert("g".to_string(), VarInit::Constant(0.5));
        let mut synapse = SynapseGroup {
            name: "Bad".to_string(),
            src: pre,
            target: post,
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
        };
        synapse.post_target_var = "Ibogus".to_string();
        let err = model.add_synapse_population(synapse).unwrap_err();
        assert!(matches!(err, IrError::UnknownTargetVariable { .. }));
    }
}
