//! Neuron populations (`spec.md` §3 "NeuronGroup").

use std::collections::{BTreeMap, BTreeSet};

use crate::codetokens::CodeTokens;
use crate::error::{IrError, Result};
use crate::types::{ArrayLocation, NumericType, VarInit, VarSpec};

/// A closure evaluated once at `finalise(dt)` time to compute one derived
/// parameter from the frozen parameter map and the model's integration
/// step.
pub type DerivedParamFn = fn(&BTreeMap<String, f64>, f64) -> f64;

/// The capability interface a neuron model exposes (`spec.md` §9:
/// collapse deep inheritance to `{getParams, getDerivedParams, getVars,
/// getCode*}` plus composition of code-fragment vectors).
#[derive(Debug, Clone)]
pub struct NeuronModel {
    /// Model name, e.g. `"LIF"`, `"Izhikevich"`.
    pub name: String,
    /// Parameter names, in declaration order.
    pub params: Vec<String>,
    /// Derived parameters: name plus the closure that computes it.
    pub derived_params: Vec<(String, DerivedParamFn)>,
    /// State variables.
    pub vars: Vec<VarSpec>,
    /// Additional per-neuron input accumulator variables current sources
    /// may target (beyond the implicit `Isyn`).
    pub additional_input_vars: Vec<VarSpec>,
    /// Per-timestep membrane/state update code.
    pub sim_code: CodeTokens,
    /// Spike condition; `None` means this population never spikes
    /// (e.g. a pure input population driven externally).
    pub threshold_condition_code: Option<CodeTokens>,
    /// Code run on a spike (after `sim_code`, guarded by the threshold).
    pub reset_code: Option<CodeTokens>,
    /// Free-standing helper functions referenced from the other code
    /// fragments.
    pub support_code: Option<CodeTokens>,
    /// Extra global parameters: one value shared by every neuron in the
    /// group, set at runtime rather than compiled in.
    pub extra_global_params: Vec<(String, NumericType)>,
    /// Whether reaching threshold while already spiking (within the
    /// refractory window) must be suppressed automatically.
    pub auto_refractory_required: bool,
}

impl NeuronModel {
    /// True if `name` is one of this model's declared parameters.
    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p == name)
    }
}

/// A named population of `num_neurons` neurons sharing one [`NeuronModel`].
#[derive(Debug, Clone)]
pub struct NeuronGroup {
    /// Population name, unique within the model.
    pub name: String,
    /// Population size.
    pub num_neurons: u32,
    /// The shared neuron model.
    pub model: NeuronModel,
    /// Concrete parameter values for this population.
    pub param_values: BTreeMap<String, f64>,
    /// Derived parameter values, computed once by `finalise(dt)`.
    pub derived_param_values: BTreeMap<String, f64>,
    /// Per-variable memory placement.
    pub var_locations: BTreeMap<String, ArrayLocation>,
    /// Per-variable initialiser, run once at `initialize` time. A
    /// variable absent from this map is left at its backing array's
    /// zeroed allocation.
    pub var_init: BTreeMap<String, VarInit>,
    /// Variable names (from connected synapse groups' weight-update
    /// code) that require delayed (queued) access, inferred at
    /// `finalise` by scanning for `<var>_pre` / `<var>_post` references.
    pub delay_required_vars: BTreeSet<String>,
    /// Whether any connected synapse group's code references `sT`/`stPre`
    /// style current-spike-time identifiers for this group.
    pub needs_spike_time: bool,
    /// Whether any connected synapse group's code references the
    /// previous spike time (`prevST`).
    pub needs_prev_spike_time: bool,
    /// Whether any connected synapse group's code references this
    /// group's spike-event time (`seT`).
    pub needs_spike_event_time: bool,
    /// Whether any connected synapse group's code references this
    /// group's previous spike-event time (`prevSET`).
    pub needs_prev_spike_event_time: bool,
    /// Buffered delay-slot count; always `>= 1`. Computed by `finalise`
    /// as `1 + max(axonal delay over outgoing synapse groups, back-prop
    /// delay over incoming synapse groups)` (`spec.md` §3 invariant).
    pub num_delay_slots: u32,
}

impl NeuronGroup {
    /// Build a new population, validating that `param_values` supplies
    /// exactly the model's declared parameters.
    pub fn new(
        name: impl Into<String>,
        num_neurons: u32,
        model: NeuronModel,
        param_values: BTreeMap<String, f64>,
    ) -> Result<Self> {
        let name = name.into();
        for declared in &model.params {
            if !param_values.contains_key(declared) {
                return Err(IrError::IncompatibleInitialiser {
                    group: name.clone(),
                    var: declared.clone(),
                    reason: "missing parameter value".to_string(),
                });
            }
        }
        for supplied in param_values.keys() {
            if !model.has_param(supplied) {
                return Err(IrError::IncompatibleInitialiser {
                    group: name.clone(),
                    var: supplied.clone(),
                    reason: "not a declared parameter of this model".to_string(),
                });
            }
        }
        Ok(Self {
            name,
            num_neurons,
            model,
            param_values,
            derived_param_values: BTreeMap::new(),
            var_locations: BTreeMap::new(),
            var_init: BTreeMap::new(),
            delay_required_vars: BTreeSet::new(),
            needs_spike_time: false,
            needs_prev_spike_time: false,
            needs_spike_event_time: false,
            needs_prev_spike_event_time: false,
            num_delay_slots: 1,
        })
    }

    /// The variable location configured for `var`, falling back to
    /// `default` if none was set explicitly.
    pub fn var_location(&self, var: &str, default: ArrayLocation) -> ArrayLocation {
        self.var_locations.get(var).copied().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models;

    #[test]
    fn rejects_missing_parameter_value() {
        let model = models::izhikevich();
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), 0.02);
        let err = NeuronGroup::new("N0", 10, model, values).unwrap_err();
        assert!(matches!(err, IrError::IncompatibleInitialiser { .. }));
    }

    #[test]
    fn rejects_unknown_parameter_value() {
        let model = models::izhikevich();
        let mut values = BTreeMap::new();
        for p in &model.params {
            values.insert(p.clone(), 0.0);
        }
        values.insert("bogus".to_string(), 1.0);
        let err = NeuronGroup::new("N0", 10, model, values).unwrap_err();
        assert!(matches!(err, IrError::IncompatibleInitialiser { .. }));
    }
}
