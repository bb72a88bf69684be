//! `Model`: the top-level arena owning every group in a network
//! (`spec.md` §3 "Model", §6 "ModelSpec configuration", §9 design note —
//! groups are addressed by stable index, never shared via `Rc`).

use std::collections::{BTreeMap, HashSet};

use crate::current_source::CurrentSource;
use crate::custom_update::{CustomConnectivityUpdate, CustomUpdate};
use crate::error::{IrError, Result};
use crate::neuron::NeuronGroup;
use crate::synapse::SynapseGroup;
use crate::types::{ArrayLocation, NumericType};

macro_rules! group_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(usize);

        impl $name {
            /// Wrap a raw arena index. Only `Model`'s own `add_*` methods
            /// should call this with a real index; tests may use it to
            /// fabricate ids for groups that don't need to resolve.
            pub fn from_index(index: usize) -> Self {
                Self(index)
            }

            /// The raw arena index.
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

group_id!(NeuronGroupId);
group_id!(SynapseGroupId);
group_id!(CurrentSourceId);
group_id!(CustomUpdateId);
group_id!(CustomConnectivityUpdateId);

/// Model-wide configuration (`spec.md` §6).
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Storage precision for `scalar` state variables.
    pub precision: NumericType,
    /// Storage precision for the simulation clock.
    pub time_precision: NumericType,
    /// Integration timestep, in milliseconds.
    pub dt: f64,
    /// Number of parallel model instances sharing one set of groups.
    pub batch_size: u32,
    /// RNG seed; `0` means "seed from entropy at `allocate` time".
    pub seed: u64,
    /// Whether to record per-pass wall-clock timing.
    pub timing: bool,
    /// Default memory placement for state variables that don't override
    /// it explicitly.
    pub default_var_location: ArrayLocation,
    /// Default memory placement for extra global parameters.
    pub default_extra_global_param_location: ArrayLocation,
    /// Default memory placement for sparse connectivity arrays.
    pub default_sparse_connectivity_location: ArrayLocation,
    /// Whether new sparse synapse groups default to narrow (`u8`/`u16`)
    /// index storage.
    pub default_narrow_sparse_ind_enabled: bool,
    /// Whether postsynaptic models are eligible for cross-group fusion.
    pub fuse_postsynaptic_models: bool,
    /// Whether weight-update pre/post dynamics are eligible for
    /// cross-group fusion.
    pub fuse_pre_post_weight_update_models: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            precision: NumericType::F32,
            time_precision: NumericType::F32,
            dt: 1.0,
            batch_size: 1,
            seed: 0,
            timing: false,
            default_var_location: ArrayLocation::default(),
            default_extra_global_param_location: ArrayLocation::default(),
            default_sparse_connectivity_location: ArrayLocation::default(),
            default_narrow_sparse_ind_enabled: false,
            fuse_postsynaptic_models: true,
            fuse_pre_post_weight_update_models: true,
        }
    }
}

/// The arena owning every group in a network, plus the configuration
/// governing how they're compiled.
#[derive(Debug, Clone)]
pub struct Model {
    /// Model (and generated library/source-file) name.
    pub name: String,
    pub config: ModelConfig,
    neuron_groups: Vec<NeuronGroup>,
    synapse_groups: Vec<SynapseGroup>,
    current_sources: Vec<CurrentSource>,
    custom_updates: Vec<CustomUpdate>,
    custom_connectivity_updates: Vec<CustomConnectivityUpdate>,
    names: HashSet<String>,
    frozen: bool,
}

impl Model {
    /// An empty model with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ModelConfig::default(),
            neuron_groups: Vec::new(),
            synapse_groups: Vec::new(),
            current_sources: Vec::new(),
            custom_updates: Vec::new(),
            custom_connectivity_updates: Vec::new(),
            names: HashSet::new(),
            frozen: false,
        }
    }

    fn claim_name(&mut self, name: &str, category: &'static str) -> Result<()> {
        if self.frozen {
            return Err(IrError::Frozen { operation: "add group" });
        }
        if !self.names.insert(name.to_string()) {
            return Err(IrError::DuplicateName { category, name: name.to_string() });
        }
        Ok(())
    }

    /// Add a neuron population, returning its stable id.
    pub fn add_neuron_population(&mut self, group: NeuronGroup) -> Result<NeuronGroupId> {
        self.claim_name(&group.name, "neuron group")?;
        let id = NeuronGroupId::from_index(self.neuron_groups.len());
        self.neuron_groups.push(group);
        Ok(id)
    }

    /// Add a synapse group connecting two already-added neuron
    /// populations, validating its internal invariants and that its
    /// target variable exists on the target population.
    pub fn add_synapse_population(&mut self, group: SynapseGroup) -> Result<SynapseGroupId> {
        self.claim_name(&group.name, "synapse group")?;
        group.validate()?;
        let target = self.neuron_group(group.target);
        if group.post_target_var != "Isyn" && !target.model.additional_input_vars.iter().any(|v| v.name == group.post_target_var) {
            return Err(IrError::UnknownTargetVariable {
                group: group.name.clone(),
                neuron_group: target.name.clone(),
                var: group.post_target_var.clone(),
            });
        }
        let source = self.neuron_group(group.src);
        if group.pre_target_var != "Isyn" && !source.model.additional_input_vars.iter().any(|v| v.name == group.pre_target_var) {
            return Err(IrError::UnknownTargetVariable {
                group: group.name.clone(),
                neuron_group: source.name.clone(),
                var: group.pre_target_var.clone(),
            });
        }
        let id = SynapseGroupId::from_index(self.synapse_groups.len());
        self.synapse_groups.push(group);
        Ok(id)
    }

    /// Add a current source targeting an existing neuron population.
    pub fn add_current_source(&mut self, source: CurrentSource) -> Result<CurrentSourceId> {
        self.claim_name(&source.name, "current source")?;
        let target = self.neuron_group(source.target);
        if source.target_var != "Isyn" && !target.model.additional_input_vars.iter().any(|v| v.name == source.target_var) {
            return Err(IrError::UnknownTargetVariable {
                group: source.name.clone(),
                neuron_group: target.name.clone(),
                var: source.target_var.clone(),
            });
        }
        let id = CurrentSourceId::from_index(self.current_sources.len());
        self.current_sources.push(source);
        Ok(id)
    }

    /// Add a custom update, validating its variable references resolve.
    pub fn add_custom_update(&mut self, update: CustomUpdate) -> Result<CustomUpdateId> {
        self.claim_name(&update.name, "custom update")?;
        update.validate()?;
        let id = CustomUpdateId::from_index(self.custom_updates.len());
        self.custom_updates.push(update);
        Ok(id)
    }

    /// Add a custom connectivity update targeting an existing synapse
    /// group.
    pub fn add_custom_connectivity_update(
        &mut self,
        update: CustomConnectivityUpdate,
    ) -> Result<CustomConnectivityUpdateId> {
        self.claim_name(&update.name, "custom connectivity update")?;
        let id = CustomConnectivityUpdateId::from_index(self.custom_connectivity_updates.len());
        self.custom_connectivity_updates.push(update);
        Ok(id)
    }

    pub fn neuron_group(&self, id: NeuronGroupId) -> &NeuronGroup {
        &self.neuron_groups[id.index()]
    }

    pub fn neuron_group_mut(&mut self, id: NeuronGroupId) -> &mut NeuronGroup {
        &mut self.neuron_groups[id.index()]
    }

    pub fn synapse_group(&self, id: SynapseGroupId) -> &SynapseGroup {
        &self.synapse_groups[id.index()]
    }

    pub fn synapse_groups(&self) -> &[SynapseGroup] {
        &self.synapse_groups
    }

    pub fn neuron_groups(&self) -> &[NeuronGroup] {
        &self.neuron_groups
    }

    pub fn current_sources(&self) -> &[CurrentSource] {
        &self.current_sources
    }

    pub fn custom_updates(&self) -> &[CustomUpdate] {
        &self.custom_updates
    }

    pub fn custom_connectivity_updates(&self) -> &[CustomConnectivityUpdate] {
        &self.custom_connectivity_updates
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Compute every derived quantity (parameter closures, delay-slot
    /// counts, spike-time flags) and freeze the model against further
    /// structural changes (`spec.md` §3, §4.1).
    ///
    /// Delay-slot inference: every synapse group's weight-update code is
    /// scanned for `<var>_pre`/`<var>_post` identifiers and the handful of
    /// fixed spike-time identifiers (`st_pre`, `prev_st_pre`, `st_post`,
    /// `prev_st_post`, `set_pre`, `prev_set_pre`), which marks the
    /// corresponding variable (or spike-time flag) on the connected
    /// neuron group as requiring delayed/queued storage.
    pub fn finalise(&mut self) -> Result<()> {
        if self.frozen {
            // Idempotent: a second `finalise()` on an already-frozen model
            // is a no-op, not a `Frozen` error (`spec.md` §8 round-trip
            // properties). Only the other mutating calls reject a frozen
            // model.
            return Ok(());
        }
        let dt = self.config.dt;
        for group in &mut self.neuron_groups {
            let mut derived = BTreeMap::new();
            for (name, f) in &group.model.derived_params {
                derived.insert(name.clone(), f(&group.param_values, dt));
            }
            group.derived_param_values = derived;
        }
        for group in &mut self.synapse_groups {
            let mut wu_derived = BTreeMap::new();
            for (name, f) in &group.weight_update_model.derived_params {
                wu_derived.insert(name.clone(), f(&group.weight_update_param_values, dt));
            }
            group.weight_update_derived_param_values = wu_derived;
            let mut ps_derived = BTreeMap::new();
            for (name, f) in &group.postsynaptic_model.derived_params {
                ps_derived.insert(name.clone(), f(&group.postsynaptic_param_values, dt));
            }
            group.postsynaptic_derived_param_values = ps_derived;
        }

        let mut delay_required: BTreeMap<usize, std::collections::BTreeSet<String>> = BTreeMap::new();
        let mut needs_spike_time: HashSet<usize> = HashSet::new();
        let mut needs_prev_spike_time: HashSet<usize> = HashSet::new();
        let mut needs_spike_event_time: HashSet<usize> = HashSet::new();
        let mut needs_prev_spike_event_time: HashSet<usize> = HashSet::new();
        for group in &self.synapse_groups {
            let src = group.src.index();
            let post = group.target.index();
            let codes = [
                Some(&group.weight_update_model.sim_code),
                group.weight_update_model.event_code.as_ref(),
                group.weight_update_model.event_threshold_code.as_ref(),
                group.weight_update_model.post_learn_code.as_ref(),
                group.weight_update_model.synapse_dynamics_code.as_ref(),
            ];
            for code in codes.into_iter().flatten() {
                for var in code.identifiers_with_suffix_stripped("_pre") {
                    delay_required.entry(src).or_default().insert(var);
                }
                for var in code.identifiers_with_suffix_stripped("_post") {
                    delay_required.entry(post).or_default().insert(var);
                }
                if code.references("st_pre") || code.references("sT_pre") {
                    needs_spike_time.insert(src);
                }
                if code.references("prev_st_pre") || code.references("prevST_pre") {
                    needs_prev_spike_time.insert(src);
                }
                if code.references("st_post") || code.references("sT_post") {
                    needs_spike_time.insert(post);
                }
                if code.references("prev_st_post") || code.references("prevST_post") {
                    needs_prev_spike_time.insert(post);
                }
                if code.references("set_pre") || code.references("seT_pre") {
                    needs_spike_event_time.insert(src);
                }
                if code.references("prev_set_pre") || code.references("prevSET_pre") {
                    needs_prev_spike_event_time.insert(src);
                }
                if code.references("set_post") || code.references("seT_post") {
                    needs_spike_event_time.insert(post);
                }
                if code.references("prev_set_post") || code.references("prevSET_post") {
                    needs_prev_spike_event_time.insert(post);
                }
            }
        }
        for (index, vars) in delay_required {
            self.neuron_groups[index].delay_required_vars = vars;
        }
        for index in 0..self.neuron_groups.len() {
            self.neuron_groups[index].needs_spike_time = needs_spike_time.contains(&index);
            self.neuron_groups[index].needs_prev_spike_time = needs_prev_spike_time.contains(&index);
            self.neuron_groups[index].needs_spike_event_time = needs_spike_event_time.contains(&index);
            self.neuron_groups[index].needs_prev_spike_event_time = needs_prev_spike_event_time.contains(&index);
        }

        let mut max_axonal: BTreeMap<usize, u32> = BTreeMap::new();
        let mut max_back_prop: BTreeMap<usize, u32> = BTreeMap::new();
        for group in &self.synapse_groups {
            let entry = max_axonal.entry(group.src.index()).or_insert(0);
            *entry = (*entry).max(group.axonal_delay_steps);
            let entry = max_back_prop.entry(group.target.index()).or_insert(0);
            *entry = (*entry).max(group.back_prop_delay_steps);
        }
        for index in 0..self.neuron_groups.len() {
            let axonal = max_axonal.get(&index).copied().unwrap_or(0);
            let back_prop = max_back_prop.get(&index).copied().unwrap_or(0);
            self.neuron_groups[index].num_delay_slots = 1 + axonal.max(back_prop);
        }

        for update in &mut self.custom_updates {
            let mut derived = BTreeMap::new();
            for (name, f) in &update.model.derived_params {
                derived.insert(name.clone(), f(&update.param_values, dt));
            }
            update.derived_param_values = derived;
        }
        for source in &mut self.current_sources {
            let mut derived = BTreeMap::new();
            for (name, f) in &source.model.derived_params {
                derived.insert(name.clone(), f(&source.param_values, dt));
            }
            source.derived_param_values = derived;
        }

        self.frozen = true;
        Ok(())
    }

    /// A short human-readable dump of group counts and names, useful for
    /// logging and manual inspection.
    pub fn to_summary(&self) -> String {
        let mut out = format!("model {} (dt={})\n", self.name, self.config.dt);
        for group in &self.neuron_groups {
            out.push_str(&format!("  neuron {} : {} x {}\n", group.name, group.num_neurons, group.model.name));
        }
        for group in &self.synapse_groups {
            out.push_str(&format!(
                "  synapse {} : {} -> {} ({} / {})\n",
                group.name,
                self.neuron_groups[group.src.index()].name,
                self.neuron_groups[group.target.index()].name,
                group.weight_update_model.name,
                group.postsynaptic_model.name,
            ));
        }
        for source in &self.current_sources {
            out.push_str(&format!("  current_source {} -> {}\n", source.name, self.neuron_groups[source.target.index()].name));
        }
        for update in &self.custom_updates {
            out.push_str(&format!("  custom_update {} [{}]\n", update.name, update.update_group_name));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models;
    use std::collections::BTreeMap as Map;

    fn lif_group(name: &str, n: u32) -> NeuronGroup {
        let model = models::lif();
        let mut values = Map::new();
        values.insert("C".to_string(), 1.0);
        values.insert("TauM".to_string(), 20.0);
        values.insert("Vrest".to_string(), -70.0);
        values.insert("Vreset".to_string(), -70.0);
        values.insert("Vthresh".to_string(), -50.0);
        values.insert("Ioffset".to_string(), 0.0);
        values.insert("TRefrac".to_string(), 2.0);
        NeuronGroup::new(name, n, model, values).unwrap()
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut model = Model::new("net");
        model.add_neuron_population(lif_group("N", 10)).unwrap();
        let err = model.add_neuron_population(lif_group("N", 5)).unwrap_err();
        assert!(matches!(err, IrError::DuplicateName { .. }));
    }

    #[test]
    fn finalise_computes_derived_params_and_freezes() {
        let mut model = Model::new("net");
        model.add_neuron_population(lif_group("N", 10)).unwrap();
        model.finalise().unwrap();
        assert!(model.neuron_group(NeuronGroupId::from_index(0)).derived_param_values.contains_key("ExpTC"));
        let err = model.add_neuron_population(lif_group("M", 1)).unwrap_err();
        assert!(matches!(err, IrError::Frozen { .. }));
    }

    #[test]
    fn finalise_is_idempotent_on_an_already_frozen_model() {
        let mut model = Model::new("net");
        model.add_neuron_population(lif_group("N", 10)).unwrap();
        model.finalise().unwrap();
        model.finalise().unwrap();
        assert!(model.is_frozen());
    }

    #[test]
    fn default_delay_slots_is_one_with_no_synapses() {
        let mut model = Model::new("net");
        model.add_neuron_population(lif_group("N", 10)).unwrap();
        model.finalise().unwrap();
        assert_eq!(model.neuron_group(NeuronGroupId::from_index(0)).num_delay_slots, 1);
    }
}
