//! Fusion (`spec.md` §4.3, §9 open question (b)): the value-level gate
//! on top of structural merging that lets several synapse groups sharing
//! a target (or source) neuron population share one backing array
//! (`outPost`/`outPre`/WUM pre- or post-scoped state) instead of each
//! owning its own.
//!
//! Merging (`merge.rs`) applies within one emission pass regardless of
//! which neuron group a synapse group targets. Fusion narrows that
//! further: it only ever groups synapse groups that (a) target/source
//! the *same* neuron group and (b) agree on the pass's fuse-level digest
//! and eligibility predicate (`can_ps_be_fused` and friends).

use std::collections::BTreeMap;

use nirg_ir::hash::{pre_output_hash_digest, ps_fuse_hash_digest, wu_post_fuse_hash_digest, wu_pre_fuse_hash_digest};
use nirg_ir::{HashDigest, Model, SynapseGroup, SynapseGroupId};

/// One fusion bucket: `archetype` owns the backing array; `consumers`
/// read/write through the archetype's array rather than allocating their
/// own (`spec.md` §9 open question (b): only the archetype may read the
/// fused `inSyn`).
#[derive(Debug, Clone)]
pub struct FusedConsumerGroup {
    pub archetype: SynapseGroupId,
    pub consumers: Vec<SynapseGroupId>,
}

impl FusedConsumerGroup {
    /// The archetype followed by every consumer, in stable order.
    pub fn members(&self) -> impl Iterator<Item = SynapseGroupId> + '_ {
        std::iter::once(self.archetype).chain(self.consumers.iter().copied())
    }

    pub fn is_fused(&self) -> bool {
        !self.consumers.is_empty()
    }
}

fn fuse_by(
    model: &Model,
    key_group: impl Fn(&SynapseGroup) -> usize,
    eligible: impl Fn(&SynapseGroup) -> bool,
    fusion_enabled: bool,
    digest: impl Fn(&SynapseGroup) -> HashDigest,
) -> Vec<FusedConsumerGroup> {
    let mut buckets: BTreeMap<(usize, HashDigest), Vec<usize>> = BTreeMap::new();
    let mut singletons: Vec<usize> = Vec::new();
    for (i, group) in model.synapse_groups().iter().enumerate() {
        if fusion_enabled && eligible(group) {
            buckets.entry((key_group(group), digest(group))).or_default().push(i);
        } else {
            singletons.push(i);
        }
    }
    let mut result: Vec<FusedConsumerGroup> = buckets
        .into_values()
        .map(|members| FusedConsumerGroup {
            archetype: SynapseGroupId::from_index(members[0]),
            consumers: members[1..].iter().map(|&i| SynapseGroupId::from_index(i)).collect(),
        })
        .collect();
    result.extend(singletons.into_iter().map(|i| FusedConsumerGroup {
        archetype: SynapseGroupId::from_index(i),
        consumers: Vec::new(),
    }));
    result.sort_by_key(|g| g.archetype.index());
    result
}

/// Postsynaptic-model fusion, keyed on the target neuron group
/// (`spec.md` §4.3 `canPSBeFused`).
pub fn fuse_postsynaptic_models(model: &Model) -> Vec<FusedConsumerGroup> {
    fuse_by(
        model,
        |g| g.target.index(),
        |g| g.can_ps_be_fused(),
        model.config.fuse_postsynaptic_models,
        ps_fuse_hash_digest,
    )
}

/// Weight-update presynaptic-dynamics fusion, keyed on the source
/// neuron group.
pub fn fuse_wu_pre_models(model: &Model) -> Vec<FusedConsumerGroup> {
    fuse_by(
        model,
        |g| g.src.index(),
        |g| g.can_wu_pre_be_fused(),
        model.config.fuse_pre_post_weight_update_models,
        wu_pre_fuse_hash_digest,
    )
}

/// Weight-update postsynaptic-dynamics fusion, keyed on the target
/// neuron group.
pub fn fuse_wu_post_models(model: &Model) -> Vec<FusedConsumerGroup> {
    fuse_by(
        model,
        |g| g.target.index(),
        |g| g.can_wu_post_be_fused(),
        model.config.fuse_pre_post_weight_update_models,
        wu_post_fuse_hash_digest,
    )
}

/// Outgoing pre-output accumulation fusion, keyed on the source neuron
/// group. `spec.md` defines no separate value-level fuse digest for this
/// pass (only `getPreOutputHashDigest`); eligibility is therefore purely
/// structural and always enabled, matching the plain (non-fuse) digest
/// family's treatment of every other merge decision.
pub fn fuse_pre_output_models(model: &Model) -> Vec<FusedConsumerGroup> {
    fuse_by(model, |g| g.src.index(), |_| true, true, pre_output_hash_digest)
}

/// Look up which [`FusedConsumerGroup`] (if any among `groups`) a given
/// synapse group belongs to, and whether it is that group's archetype.
pub fn locate(groups: &[FusedConsumerGroup], id: SynapseGroupId) -> Option<(&FusedConsumerGroup, bool)> {
    groups.iter().find_map(|g| {
        if g.archetype == id {
            Some((g, true))
        } else if g.consumers.contains(&id) {
            Some((g, false))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nirg_ir::{models, ArrayLocation, ConnectivityInit, MatrixType, ModelConfig, NeuronGroup, SpanType, VarInit};
    use std::collections::BTreeMap;

    fn lif_values() -> BTreeMap<String, f64> {
        [("C", 1.0), ("TauM", 20.0), ("Vrest", -70.0), ("Vreset", -70.0), ("Vthresh", -50.0), ("Ioffset", 0.0), ("TRefrac", 2.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn dense_static_pulse(src: nirg_ir::NeuronGroupId, target: nirg_ir::NeuronGroupId, name: &str) -> SynapseGroup {
        let mut weight_var_init = BTreeMap::new();
        weight_var_init.insert("g".to_string(), VarInit::Constant(1.0));
        SynapseGroup {
            name: name.to_string(),
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

    #[test]
    fn two_synapse_groups_sharing_a_target_fuse_when_eligible() {
        let mut model = Model::new("net");
        model.config = ModelConfig { fuse_postsynaptic_models: true, ..ModelConfig::default() };
        let a = model.add_neuron_population(NeuronGroup::new("A", 10, models::lif(), lif_values()).unwrap()).unwrap();
        let b = model.add_neuron_population(NeuronGroup::new("B", 10, models::lif(), lif_values()).unwrap()).unwrap();
        let post = model.add_neuron_population(NeuronGroup::new("Post", 10, models::lif(), lif_values()).unwrap()).unwrap();
        model.add_synapse_population(dense_static_pulse(a, post, "A_Post")).unwrap();
        model.add_synapse_population(dense_static_pulse(b, post, "B_Post")).unwrap();
        model.finalise().unwrap();

        let fused = fuse_postsynaptic_models(&model);
        assert_eq!(fused.len(), 1);
        assert!(fused[0].is_fused());
        assert_eq!(fused[0].consumers.len(), 1);
    }

    #[test]
    fn groups_targeting_different_populations_never_fuse() {
        let mut model = Model::new("net");
        let a = model.add_neuron_population(NeuronGroup::new("A", 10, models::lif(), lif_values()).unwrap()).unwrap();
        let p0 = model.add_neuron_population(NeuronGroup::new("P0", 10, models::lif(), lif_values()).unwrap()).unwrap();
        let p1 = model.add_neuron_population(NeuronGroup::new("P1", 10, models::lif(), lif_values()).unwrap()).unwrap();
        model.add_synapse_population(dense_static_pulse(a, p0, "A_P0")).unwrap();
        model.add_synapse_population(dense_static_pulse(a, p1, "A_P1")).unwrap();
        model.finalise().unwrap();

        let fused = fuse_postsynaptic_models(&model);
        assert_eq!(fused.len(), 2);
        assert!(fused.iter().all(|g| !g.is_fused()));
    }

    #[test]
    fn disabling_fusion_model_wide_yields_only_singletons() {
        let mut model = Model::new("net");
        model.config = ModelConfig { fuse_postsynaptic_models: false, ..ModelConfig::default() };
        let a = model.add_neuron_population(NeuronGroup::new("A", 10, models::lif(), lif_values()).unwrap()).unwrap();
        let b = model.add_neuron_population(NeuronGroup::new("B", 10, models::lif(), lif_values()).unwrap()).unwrap();
        let post = model.add_neuron_population(NeuronGroup::new("Post", 10, models::lif(), lif_values()).unwrap()).unwrap();
        model.add_synapse_population(dense_static_pulse(a, post, "A_Post")).unwrap();
        model.add_synapse_population(dense_static_pulse(b, post, "B_Post")).unwrap();
        model.finalise().unwrap();

        let fused = fuse_postsynaptic_models(&model);
        assert_eq!(fused.len(), 2);
        assert!(fused.iter().all(|g| !g.is_fused()));
    }
}
