//! Backend contract and a single-threaded host reference backend
//! (`spec.md` §6 "Backend contract").
//!
//! This crate specifies the interface every concrete device backend
//! (CUDA, OpenCL, …) must satisfy to be driven by `nirg-codegen`'s
//! kernel emitter, and ships exactly one concrete implementation: a
//! sequential host backend, grounded in the teacher's own FFI crate
//! (`shnn-ffi`) for the idea of a thin, dependency-light boundary crate
//! between the IR/codegen layer and a concrete execution target — but
//! carrying the GeNN-style backend contract rather than a C ABI.

pub mod array;
pub mod contract;
pub mod host;

pub use array::Array;
pub use contract::{Axis, AtomicOp, Backend, BlockSizes, MemorySpace, Preferences};
pub use host::HostBackend;
