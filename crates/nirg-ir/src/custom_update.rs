//! Custom updates: code run out-of-band (outside the regular neuron/
//! synapse update passes) against variables borrowed from existing groups,
//! batched together under a named update group so callers can trigger a
//! whole family of them with one `updateCustom("name")` call.

use std::collections::BTreeMap;

use crate::codetokens::CodeTokens;
use crate::error::{IrError, Result};
use crate::model::{NeuronGroupId, SynapseGroupId};
use crate::neuron::DerivedParamFn;
use crate::types::{NumericType, VarSpec};

/// Whether a custom update's code may only read a borrowed variable or
/// may also write it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRefAccess {
    ReadOnly,
    ReadWrite,
}

/// Which existing group's variable a custom update's `var_refs` entry
/// resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarRefTarget {
    Neuron(NeuronGroupId, String),
    Synapse(SynapseGroupId, String),
}

/// One resolved variable reference.
#[derive(Debug, Clone)]
pub struct VarRef {
    pub target: VarRefTarget,
    pub access: VarRefAccess,
}

/// The capability interface a custom-update model exposes.
#[derive(Debug, Clone)]
pub struct CustomUpdateModel {
    pub name: String,
    pub params: Vec<String>,
    pub derived_params: Vec<(String, DerivedParamFn)>,
    /// State variables owned by the custom update itself.
    pub vars: Vec<VarSpec>,
    /// Declared variable-reference slots, each with the access mode the
    /// model's `update_code` requires.
    pub var_ref_names: Vec<(String, VarRefAccess)>,
    /// Code run once per invocation of the owning update group.
    pub update_code: CodeTokens,
    pub extra_global_params: Vec<(String, NumericType)>,
}

/// A named custom update, batched into `update_group_name`.
#[derive(Debug, Clone)]
pub struct CustomUpdate {
    pub name: String,
    /// The name callers pass to `updateCustom` to trigger every custom
    /// update sharing this group name together.
    pub update_group_name: String,
    pub model: CustomUpdateModel,
    pub param_values: BTreeMap<String, f64>,
    pub derived_param_values: BTreeMap<String, f64>,
    /// Concrete resolution of each of `model.var_ref_names`.
    pub var_refs: BTreeMap<String, VarRef>,
}

impl CustomUpdate {
    /// Validate that `var_refs` supplies exactly the model's declared
    /// slots, with access no stricter than the model allows write access
    /// is satisfiable (a `ReadWrite` slot may be satisfied by a
    /// `ReadWrite` reference only).
    pub fn validate(&self) -> Result<()> {
        for (name, access) in &self.model.var_ref_names {
            match self.var_refs.get(name) {
                None => {
                    return Err(IrError::IncompatibleInitialiser {
                        group: self.name.clone(),
                        var: name.clone(),
                        reason: "missing variable reference".to_string(),
                    })
                }
                Some(var_ref) => {
                    if *access == VarRefAccess::ReadWrite && var_ref.access == VarRefAccess::ReadOnly {
                        return Err(IrError::IncompatibleInitialiser {
                            group: self.name.clone(),
                            var: name.clone(),
                            reason: "model requires read-write access to this reference".to_string(),
                        });
                    }
                }
            }
        }
        for name in self.var_refs.keys() {
            if !self.model.var_ref_names.iter().any(|(n, _)| n == name) {
                return Err(IrError::IncompatibleInitialiser {
                    group: self.name.clone(),
                    var: name.clone(),
                    reason: "not a declared variable reference of this model".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// The capability interface a custom connectivity-update model exposes:
/// code run once per presynaptic row to add/remove connections or adjust
/// per-connection state outside the regular timestep loop.
#[derive(Debug, Clone)]
pub struct CustomConnectivityUpdateModel {
    pub name: String,
    pub params: Vec<String>,
    pub derived_params: Vec<(String, DerivedParamFn)>,
    /// Per-connection state variables.
    pub vars: Vec<VarSpec>,
    /// Presynaptic-neuron-scoped state variables.
    pub pre_vars: Vec<VarSpec>,
    /// Postsynaptic-neuron-scoped state variables.
    pub post_vars: Vec<VarSpec>,
    pub var_ref_names: Vec<(String, VarRefAccess)>,
    /// Code run once per presynaptic row.
    pub row_update_code: CodeTokens,
    /// Code run once on the host after every row has been updated.
    pub host_update_code: Option<CodeTokens>,
}

/// A named custom connectivity update attached to one synapse group.
#[derive(Debug, Clone)]
pub struct CustomConnectivityUpdate {
    pub name: String,
    pub update_group_name: String,
    pub target: SynapseGroupId,
    pub model: CustomConnectivityUpdateModel,
    pub param_values: BTreeMap<String, f64>,
    pub derived_param_values: BTreeMap<String, f64>,
    pub var_refs: BTreeMap<String, VarRef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codetokens::CodeTokens;

    fn model() -> CustomUpdateModel {
        CustomUpdateModel {
            name: "Gradient".to_string(),
            params: vec![],
            derived_params: vec![],
            vars: vec![],
            var_ref_names: vec![("weight".to_string(), VarRefAccess::ReadWrite)],
            update_code: CodeTokens::scan("weight -= 0.01;", "ctx").unwrap(),
            extra_global_params: vec![],
        }
    }

    #[test]
    fn rejects_missing_var_ref() {
        let update = CustomUpdate {
            name: "U".to_string(),
            update_group_name: "grad".to_string(),
            model: model(),
            param_values: BTreeMap::new(),
            derived_param_values: BTreeMap::new(),
            var_refs: BTreeMap::new(),
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn rejects_readonly_ref_for_readwrite_slot() {
        let mut refs = BTreeMap::new();
        refs.insert(
            "weight".to_string(),
            VarRef { target: VarRefTarget::Synapse(SynapseGroupId::from_index(0), "g".to_string()), access: VarRefAccess::ReadOnly },
        );
        let update = CustomUpdate {
            name: "U".to_string(),
            update_group_name: "grad".to_string(),
            model: model(),
            param_values: BTreeMap::new(),
            derived_param_values: BTreeMap::new(),
            var_refs: refs,
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn accepts_matching_readwrite_ref() {
        let mut refs = BTreeMap::new();
        refs.insert(
            "weight".to_string(),
            VarRef { target: VarRefTarget::Synapse(SynapseGroupId::from_index(0), "g".to_string()), access: VarRefAccess::ReadWrite },
        );
        let update = CustomUpdate {
            name: "U".to_string(),
            update_group_name: "grad".to_string(),
            model: model(),
            param_values: BTreeMap::new(),
            derived_param_values: BTreeMap::new(),
            var_refs: refs,
        };
        assert!(update.validate().is_ok());
    }
}
