//! Runtime environment errors (`spec.md` §7 "Runtime environment errors").

use thiserror::Error;

/// Result alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Fatal errors surfaced while loading, allocating, or stepping a
/// compiled model (`spec.md` §7). There is no recoverable variant: every
/// one of these aborts the run.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The compiled shared library could not be opened.
    #[error("failed to load library '{path}': {source}")]
    LoadFailure {
        /// Path passed to `Runtime::load`.
        path: String,
        /// The underlying `libloading` failure.
        #[source]
        source: libloading::Error,
    },

    /// A required exported symbol was not found in the loaded library.
    #[error("library '{library}' is missing exported symbol '{symbol}'")]
    SymbolMissing {
        /// Path of the loaded library.
        library: String,
        /// The symbol name that failed to resolve.
        symbol: String,
    },

    /// Spike recording was requested without a recording-buffer size
    /// having been configured first (`spec.md` §4.7 `allocate`).
    #[error("recording requested for group '{group}' but no recording timestep count was set")]
    RecordingUnset {
        /// The group recording was requested for.
        group: String,
    },

    /// Two allocations were attempted for the same `(group, name)` key.
    #[error("array '{name}' already allocated for group '{group}'")]
    DuplicateArray {
        /// The owning group's name.
        group: String,
        /// The array's variable name.
        name: String,
    },

    /// `getArray` was called for a `(group, name)` pair that was never
    /// allocated.
    #[error("no array '{name}' allocated for group '{group}'")]
    ArrayNotFound {
        /// The owning group's name.
        group: String,
        /// The array's variable name.
        name: String,
    },

    /// An exported entrypoint (`stepTime`, `initialize`,
    /// `initializeSparse`) reported failure. `stepTime` either completes
    /// or fails with this variant; there is no partial step.
    #[error("backend call '{call}' failed: {reason}")]
    BackendError {
        /// The entrypoint that failed.
        call: &'static str,
        /// Human-readable failure reason.
        reason: String,
    },
}
