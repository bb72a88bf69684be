//! The backend contract (`spec.md` §6 "Backend contract (consumed by
//! core)"): the abstract surface every concrete device backend (CUDA,
//! OpenCL, single-threaded CPU, …) must provide so the kernel emitter in
//! `nirg-codegen` can stitch backend-parameterized source without naming
//! a specific device API.
//!
//! Concrete backends are out of scope for this crate beyond one
//! reference implementation ([`crate::host::HostBackend`]); everything
//! here is the interface the emitter programs against.

use nirg_ir::{NumericType, SynapseGroup};

use crate::array::Array;

/// A launch axis (thread or block index within a kernel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// The memory space an atomic operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemorySpace {
    Global,
    Shared,
}

/// The operation an atomic performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicOp {
    Add,
    Or,
}

/// Per-kernel-kind launch block sizes (`spec.md` §6 `getPreferences()`
/// `blockSize{...}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSizes {
    pub neuron: usize,
    pub presyn_update: usize,
    pub postsyn_update: usize,
    pub synapse_dynamics: usize,
    pub init: usize,
    pub init_sparse: usize,
    pub custom_update: usize,
    pub custom_transpose: usize,
}

impl Default for BlockSizes {
    fn default() -> Self {
        Self {
            neuron: 256,
            presyn_update: 256,
            postsyn_update: 256,
            synapse_dynamics: 256,
            init: 256,
            init_sparse: 256,
            custom_update: 256,
            custom_transpose: 256,
        }
    }
}

/// Recognised backend options (`spec.md` §6 `getPreferences()`).
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    /// Emit extra bounds-checked, debug-friendly source instead of the
    /// fastest shape.
    pub debug_code: bool,
    /// Push/pull arrays automatically around every `stepTime` rather
    /// than leaving that to the caller.
    pub automatic_copy: bool,
    pub block_size: BlockSizes,
    /// Pack BITMASK connectivity with extra emitted shortcuts (popcount
    /// skip-ahead) when the backend provides `getCLZ()`-style support.
    pub enable_bitmask_optimisations: bool,
    /// Emit unrolled, branch-free kernel bodies where the model shape
    /// allows it, trading code size for fewer divergent branches.
    pub generate_simple_code: bool,
    /// Emit an (unused) per-member state struct even for merged groups
    /// whose every field turned out homogeneous, so downstream tooling
    /// can rely on a uniform struct shape.
    pub generate_empty_state_for_fused_groups: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            debug_code: false,
            automatic_copy: false,
            block_size: BlockSizes::default(),
            enable_bitmask_optimisations: true,
            generate_simple_code: false,
            generate_empty_state_for_fused_groups: false,
        }
    }
}

/// The abstract surface a concrete device backend provides to the
/// kernel emitter (`spec.md` §6).
pub trait Backend {
    /// Allocate a new backing array of `count` elements of `ty`, placed
    /// according to `location`.
    fn create_array(&self, ty: NumericType, count: usize, location: nirg_ir::ArrayLocation) -> Array {
        Array::allocate(ty, count, location)
    }

    /// Rounded-up row length used for array sizing of `sg`'s sparse
    /// connectivity, given its target population size `num_post`
    /// (`spec.md` §6 `getSynapticMatrixRowStride`).
    fn synaptic_matrix_row_stride(&self, sg: &SynapseGroup, num_post: u32) -> usize;

    /// Backend-target pointer-qualifier prefix (e.g. `"__restrict__"`,
    /// or empty for a backend with no such qualifier).
    fn pointer_prefix(&self) -> &'static str;

    /// Backend-target shared/local-memory qualifier prefix.
    fn shared_prefix(&self) -> &'static str;

    /// Source expression yielding the calling thread's index along `axis`.
    fn thread_id(&self, axis: Axis) -> String;

    /// Source expression yielding the calling block's index along `axis`.
    fn block_id(&self, axis: Axis) -> String;

    /// Source expression computing count-leading-zeros of `expr`.
    fn clz(&self, expr: &str) -> String;

    /// The identifier naming an atomic of the requested flavour, called
    /// as `<identifier>(&target, value)` by emitted kernel text.
    fn atomic(&self, ty: NumericType, op: AtomicOp, space: MemorySpace) -> String;

    /// A full statement synchronising every thread in a block.
    fn shared_mem_barrier(&self) -> String;

    /// Per-neuron population-RNG state initialisation, seeded from
    /// `seed_expr`.
    fn gen_population_rng_init(&self, seed_expr: &str) -> String;

    /// Declarations emitted before a kernel body that uses the
    /// population RNG.
    fn gen_population_rng_preamble(&self) -> String;

    /// Statements emitted after a kernel body that used the population
    /// RNG, to persist its advanced state.
    fn gen_population_rng_postamble(&self) -> String;

    /// Advances the global RNG stream by `sequence_expr` draws, used to
    /// keep independent kernels' random streams from overlapping.
    fn gen_global_rng_skip_ahead(&self, sequence_expr: &str) -> String;

    /// Whether this backend needs `colLength`/`remap` built for a
    /// synapse group with post-learn code (`spec.md` §9 open question c).
    fn is_postsynaptic_remap_required(&self) -> bool;

    /// Whether per-neuron population RNG state is required at all (a
    /// backend with no on-device RNG may compute everything from a
    /// single global stream instead).
    fn is_population_rng_required(&self) -> bool;

    /// Whether this backend needs host-side scalar constants also
    /// materialised as device-resident values.
    fn is_device_scalar_required(&self) -> bool;

    /// Whether shared-memory atomics are slow enough that the emitter
    /// should fall back to global atomics instead (`spec.md` §4.6).
    fn are_shared_mem_atomics_slow(&self) -> bool;

    /// The backend's configured preferences.
    fn preferences(&self) -> &Preferences;
}
