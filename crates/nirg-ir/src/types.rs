//! Small shared value types used across neuron/synapse/current-source
//! group definitions.

pub use nirg_transpile::NumericType;

use crate::codetokens::CodeTokens;

/// How one state variable is initialised.
#[derive(Debug, Clone)]
pub enum VarInit {
    /// A fixed value shared by every instance at construction (may still
    /// become a per-member runtime field if heterogeneous across a
    /// merged group — see `nirg_codegen::merge`).
    Constant(f64),
    /// Initialiser code run once per connection/neuron at `initialize`
    /// time; may call RNG support functions.
    Code(CodeTokens),
}

impl VarInit {
    /// True for the `Constant` variant.
    pub fn is_constant(&self) -> bool {
        matches!(self, VarInit::Constant(_))
    }

    /// The constant value, if this is a `Constant` initialiser.
    pub fn constant_value(&self) -> Option<f64> {
        match self {
            VarInit::Constant(v) => Some(*v),
            VarInit::Code(_) => None,
        }
    }

    /// True if this initialiser's code calls one of the RNG support
    /// functions (`spec.md` §3: "weight initialisers only RNG-free
    /// unless procedural connectivity").
    pub fn references_rng(&self) -> bool {
        match self {
            VarInit::Constant(_) => false,
            VarInit::Code(code) => {
                ["gennrand_uniform", "gennrand_normal", "gennrand_exponential"].iter().any(|f| code.references(f))
            }
        }
    }
}

/// Memory-placement choice for a backing array (`spec.md` §3 `Array`,
/// §6 configuration options).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ArrayLocation {
    /// Host memory only.
    HostOnly,
    /// Device memory only.
    DeviceOnly,
    /// Mirrored on host and device, explicit push/pull.
    HostDevice,
    /// Mirrored via zero-copy host/device mapping.
    HostDeviceZeroCopy,
}

impl Default for ArrayLocation {
    fn default() -> Self {
        ArrayLocation::HostDevice
    }
}

/// Read/write capability of a state variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VarAccess {
    /// Read and write.
    ReadWrite,
    /// Read-only: a captured external value.
    ReadOnly,
}

/// One state-variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarSpec {
    /// Variable name, referenced from model code.
    pub name: String,
    /// Read/write capability.
    pub access: VarAccess,
    /// Numeric kind override; `None` means "the model's configured
    /// `scalar` precision".
    pub ty: Option<NumericType>,
}

impl VarSpec {
    /// A read-write variable at the model's scalar precision.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self { name: name.into(), access: VarAccess::ReadWrite, ty: None }
    }

    /// A read-only variable at the model's scalar precision.
    pub fn readonly(name: impl Into<String>) -> Self {
        Self { name: name.into(), access: VarAccess::ReadOnly, ty: None }
    }

    /// Override this variable's storage type.
    pub fn with_type(mut self, ty: NumericType) -> Self {
        self.ty = Some(ty);
        self
    }
}

/// The connectivity representation a synapse group's weight matrix uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectivityKind {
    /// Fully materialised `numPre x numPost` matrix.
    Dense,
    /// Per-row compressed sparse (`rowLength` + `ind`).
    Sparse,
    /// One bit per possible connection.
    Bitmask,
    /// Connectivity computed on the fly from a procedural rule, never
    /// materialised.
    Procedural,
    /// Convolution-style kernel replicated across a Toeplitz structure.
    Toeplitz,
}

/// How a synapse group's weight values are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WeightStorage {
    /// One weight value per connection.
    Individual,
    /// One shared weight kernel replicated across connections.
    Kernel,
    /// Weight computed procedurally, never materialised.
    ProceduralG,
}

/// A synapse group's full matrix-type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixType {
    /// Connectivity representation.
    pub connectivity: ConnectivityKind,
    /// Weight storage strategy.
    pub weight: WeightStorage,
}

impl MatrixType {
    /// Dense connectivity with one weight per connection (the common
    /// default).
    pub fn dense_individual() -> Self {
        Self { connectivity: ConnectivityKind::Dense, weight: WeightStorage::Individual }
    }

    /// Sparse connectivity with one weight per connection.
    pub fn sparse_individual() -> Self {
        Self { connectivity: ConnectivityKind::Sparse, weight: WeightStorage::Individual }
    }

    /// A compact byte encoding used only for structural hashing.
    pub fn bits(&self) -> u8 {
        ((self.connectivity as u8) << 4) | (self.weight as u8)
    }
}

/// The axis of parallelism a presynaptic-update kernel launches over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanType {
    /// One thread per source neuron; each iterates its row of targets.
    Presynaptic,
    /// One thread per target neuron; each iterates the incoming spike
    /// buffer.
    Postsynaptic,
}
