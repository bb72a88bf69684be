//! Errors raised while building and finalising a [`crate::model::Model`].

use thiserror::Error;

/// Result alias for IR operations.
pub type Result<T> = std::result::Result<T, IrError>;

/// Configuration and validation errors (`spec.md` §7 "configuration
/// errors"): detected at IR construction, unrecoverable, surfaced
/// immediately rather than accumulated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrError {
    /// A name was reused within its category (neuron groups, synapse
    /// groups, current sources, or custom updates each have their own
    /// namespace).
    #[error("duplicate {category} name '{name}'")]
    DuplicateName {
        /// Which namespace the collision occurred in.
        category: &'static str,
        /// The offending name.
        name: String,
    },
    /// A synapse group's matrix-type flags are mutually incompatible
    /// (e.g. TOEPLITZ with a column-build connectivity initialiser).
    #[error("synapse group '{group}': invalid matrix type configuration: {reason}")]
    InvalidMatrixType {
        /// The offending synapse group.
        group: String,
        /// Human-readable reason.
        reason: String,
    },
    /// A variable initialiser could not be reconciled with its
    /// declared access mode or connectivity requirements.
    #[error("'{group}': incompatible initialiser for '{var}': {reason}")]
    IncompatibleInitialiser {
        /// The offending group.
        group: String,
        /// The variable being initialised.
        var: String,
        /// Human-readable reason.
        reason: String,
    },
    /// A synapse group's configured target variable does not exist as
    /// `Isyn` or an additional input variable on the target neuron group.
    #[error("synapse group '{group}': unknown target variable '{var}' on neuron group '{neuron_group}'")]
    UnknownTargetVariable {
        /// The offending synapse group.
        group: String,
        /// The neuron group it targets.
        neuron_group: String,
        /// The target variable name that did not resolve.
        var: String,
    },
    /// A code fragment failed to scan at construction time.
    #[error("'{context}': {source}")]
    Syntax {
        /// Fragment identity (group name + fragment kind).
        context: String,
        /// The underlying scan failure.
        #[source]
        source: nirg_transpile::TranspileError,
    },
    /// A mutating call was made after [`crate::model::Model::finalise`].
    #[error("model is frozen: cannot call '{operation}' after finalise()")]
    Frozen {
        /// The attempted operation.
        operation: &'static str,
    },
    /// A consumer other than a fused postsynaptic model's archetype
    /// attempted to read its `inSyn` array (`spec.md` §9 open question b).
    #[error("synapse group '{group}': 'inSyn' of a fused postsynaptic model may only be read by its archetype")]
    FusedInSynAccess {
        /// The offending synapse group.
        group: String,
    },
}

impl IrError {
    /// Wrap a transpiler scan/parse failure as a `Syntax` error with
    /// fragment context attached.
    pub fn syntax(context: impl Into<String>, source: nirg_transpile::TranspileError) -> Self {
        IrError::Syntax { context: context.into(), source }
    }
}
