//! `nirg-codegen`'s error type (`spec.md` §7 "Code-fragment errors" and
//! the generation-pass-level failure they escalate to).
//!
//! Per fragment, type-check diagnostics are accumulated on an
//! `ErrorHandler` (see `nirg_transpile::ErrorHandler`) rather than
//! failing immediately; a kernel-emission function collects every
//! fragment's diagnostics across the whole pass and only then returns
//! `Err` with the complete set, matching `spec.md` §4.4's
//! "accumulate-then-fail" policy.

use nirg_transpile::TranspileError;

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, CodegenError>;

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// One or more code fragments failed to type-check during this
    /// emission pass. Carries every diagnostic collected, not just the
    /// first.
    #[error("{} code-fragment diagnostic(s) during emission", .0.len())]
    Diagnostics(Vec<TranspileError>),

    /// A synapse group's code attempted to read a fused consumer's
    /// `inSyn` directly instead of going through the fused archetype
    /// (`spec.md` §9 open question (b)).
    #[error("synapse group '{group}' reads fused inSyn belonging to archetype '{archetype}'")]
    FusedInSynAccess { group: String, archetype: String },

    #[error(transparent)]
    Ir(#[from] nirg_ir::IrError),
}
