//! The single-threaded host reference backend: the one concrete backend
//! this crate ships, used both to exercise the kernel emitter end to end
//! and as the thing `nirg-runtime`'s tests link against.
//!
//! Per `spec.md` §5, device-side concurrency is a property of emitted
//! kernel text, not of the process generating it; a single-threaded CPU
//! target has no real atomics or shared memory, so every "atomic" and
//! "barrier" hook below compiles to the corresponding plain C operation
//! — there is exactly one thread, so nothing can race.

use nirg_ir::{NumericType, SynapseGroup};

use crate::contract::{Axis, Backend, MemorySpace, AtomicOp, Preferences};

/// Reference backend targeting a single CPU thread. Kernels it emits
/// loop sequentially over the launch index instead of mapping it to a
/// hardware thread/block grid.
#[derive(Debug, Clone)]
pub struct HostBackend {
    preferences: Preferences,
}

impl HostBackend {
    pub fn new() -> Self {
        Self { preferences: Preferences::default() }
    }

    pub fn with_preferences(preferences: Preferences) -> Self {
        Self { preferences }
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HostBackend {
    fn synaptic_matrix_row_stride(&self, _sg: &SynapseGroup, num_post: u32) -> usize {
        // No SIMD-lane padding requirement on a scalar host loop: the
        // row stride is exactly the target population size.
        num_post as usize
    }

    fn pointer_prefix(&self) -> &'static str {
        ""
    }

    fn shared_prefix(&self) -> &'static str {
        ""
    }

    fn thread_id(&self, axis: Axis) -> String {
        // A single-threaded host kernel has no real thread grid; the
        // emitter wraps the kernel body in a sequential `for` loop over
        // this same identifier instead of launching a grid.
        match axis {
            Axis::X => "hostThreadIdx".to_string(),
            Axis::Y => "hostThreadIdy".to_string(),
            Axis::Z => "hostThreadIdz".to_string(),
        }
    }

    fn block_id(&self, _axis: Axis) -> String {
        "0".to_string()
    }

    fn clz(&self, expr: &str) -> String {
        format!("__builtin_clz({expr})")
    }

    fn atomic(&self, ty: NumericType, op: AtomicOp, space: MemorySpace) -> String {
        let width = match ty {
            NumericType::F32 => "F32",
            NumericType::F64 => "F64",
            NumericType::I32 => "I32",
            NumericType::U32 => "U32",
        };
        let op_name = match op {
            AtomicOp::Add => "Add",
            AtomicOp::Or => "Or",
        };
        let space_name = match space {
            MemorySpace::Global => "Global",
            MemorySpace::Shared => "Shared",
        };
        // These name plain, non-atomic helper functions provided by the
        // host runtime's generated preamble (`*out += value;` and
        // `*out |= value;` respectively) — single-threaded execution
        // makes a real atomic unnecessary.
        format!("hostAtomic{op_name}{width}{space_name}")
    }

    fn shared_mem_barrier(&self) -> String {
        "/* no-op: single host thread */".to_string()
    }

    fn gen_population_rng_init(&self, seed_expr: &str) -> String {
        format!("hostRNGInit(&rng, {seed_expr});")
    }

    fn gen_population_rng_preamble(&self) -> String {
        "HostRNG rng;".to_string()
    }

    fn gen_population_rng_postamble(&self) -> String {
        String::new()
    }

    fn gen_global_rng_skip_ahead(&self, sequence_expr: &str) -> String {
        format!("hostRNGSkipAhead(&globalRNG, {sequence_expr});")
    }

    fn is_postsynaptic_remap_required(&self) -> bool {
        // The host backend walks incoming connections directly off the
        // sparse `ind` array instead of a transposed remap.
        false
    }

    fn is_population_rng_required(&self) -> bool {
        true
    }

    fn is_device_scalar_required(&self) -> bool {
        false
    }

    fn are_shared_mem_atomics_slow(&self) -> bool {
        // There is no shared memory distinct from global memory on this
        // backend; treat the fast path as unavailable so the emitter
        // always takes the global-atomic branch.
        true
    }

    fn preferences(&self) -> &Preferences {
        &self.preferences
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{AtomicOp, MemorySpace};

    #[test]
    fn atomic_identifier_encodes_type_op_and_space() {
        let backend = HostBackend::new();
        assert_eq!(backend.atomic(NumericType::F32, AtomicOp::Add, MemorySpace::Global), "hostAtomicAddF32Global");
        assert_eq!(backend.atomic(NumericType::U32, AtomicOp::Or, MemorySpace::Shared), "hostAtomicOrU32Shared");
    }

    #[test]
    fn shared_mem_atomics_are_always_reported_slow() {
        assert!(HostBackend::new().are_shared_mem_atomics_slow());
    }
}
