//! Current sources: out-of-band injectors targeting a neuron group's
//! additional input variables (`spec.md` §3 "CurrentSource", §4.6 step 4).

use std::collections::BTreeMap;

use crate::codetokens::CodeTokens;
use crate::model::NeuronGroupId;
use crate::neuron::DerivedParamFn;
use crate::types::{NumericType, VarSpec};

/// The capability interface a current-source model exposes.
#[derive(Debug, Clone)]
pub struct CurrentSourceModel {
    /// Model name.
    pub name: String,
    /// Parameter names.
    pub params: Vec<String>,
    /// Derived parameters.
    pub derived_params: Vec<(String, DerivedParamFn)>,
    /// State variables.
    pub vars: Vec<VarSpec>,
    /// Code run every timestep; `injectCurrent(x)` expands to `<target
    /// var> += x` against the chosen target variable.
    pub injection_code: CodeTokens,
    /// Extra global parameters.
    pub extra_global_params: Vec<(String, NumericType)>,
}

/// A named injector attached to one neuron group.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    /// Source name, unique within the model.
    pub name: String,
    /// The neuron group this source injects into.
    pub target: NeuronGroupId,
    /// The shared model.
    pub model: CurrentSourceModel,
    /// Concrete parameter values.
    pub param_values: BTreeMap<String, f64>,
    /// Derived parameter values, computed by `finalise`.
    pub derived_param_values: BTreeMap<String, f64>,
    /// Target neuron variable `injectCurrent` writes into; defaults to
    /// `"Isyn"`, but may name one of the target group's additional input
    /// variables.
    pub target_var: String,
}

impl CurrentSource {
    /// Build a new current source targeting `target_var` (`"Isyn"` by
    /// default). Existence of `target_var` on the target neuron group is
    /// validated by `Model::add_current_source`, which has group context.
    pub fn new(
        name: impl Into<String>,
        target: NeuronGroupId,
        model: CurrentSourceModel,
        param_values: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            name: name.into(),
            target,
            model,
            param_values,
            derived_param_values: BTreeMap::new(),
            target_var: "Isyn".to_string(),
        }
    }
}
