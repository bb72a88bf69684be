//! `Array`: a backend-created handle to a typed, sized buffer
//! (`spec.md` §3 "Array").
//!
//! This crate only ever targets the single-threaded host reference
//! backend, so "device" and "host" are the same address space; `push`
//! and `pull` still exist (and still copy) to keep the host/device
//! boundary explicit in caller code, matching the contract a real
//! CUDA/OpenCL backend would have to honour.

use nirg_ir::{ArrayLocation, NumericType};

fn elem_size(ty: NumericType) -> usize {
    match ty {
        NumericType::F32 => 4,
        NumericType::F64 => 8,
        NumericType::I32 => 4,
        NumericType::U32 => 4,
    }
}

/// A typed, host-backed buffer.
#[derive(Debug, Clone)]
pub struct Array {
    ty: NumericType,
    count: usize,
    location: ArrayLocation,
    host: Vec<u8>,
    /// Mirrors `host` for backends with a real device copy; for the host
    /// reference backend this is simply a second copy kept in sync by
    /// `push`/`pull`.
    device: Vec<u8>,
}

impl Array {
    /// Allocate `count` zero-initialised elements of `ty`.
    pub fn allocate(ty: NumericType, count: usize, location: ArrayLocation) -> Self {
        let bytes = count * elem_size(ty);
        Self { ty, count, location, host: vec![0u8; bytes], device: vec![0u8; bytes] }
    }

    pub fn numeric_type(&self) -> NumericType {
        self.ty
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn location(&self) -> ArrayLocation {
        self.location
    }

    /// Copy the current host buffer to the device mirror.
    pub fn push(&mut self) {
        self.device.copy_from_slice(&self.host);
    }

    /// Copy the current device mirror back to the host buffer.
    pub fn pull(&mut self) {
        self.host.copy_from_slice(&self.device);
    }

    /// Release the backing storage, leaving the array empty.
    pub fn free(&mut self) {
        self.host.clear();
        self.device.clear();
        self.count = 0;
    }

    pub fn host_bytes(&self) -> &[u8] {
        &self.host
    }

    pub fn host_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.host
    }

    fn assert_type(&self, expected: NumericType) {
        assert_eq!(self.ty, expected, "array type mismatch: stored {:?}, requested {:?}", self.ty, expected);
    }

    pub fn as_f32_slice(&self) -> &[f32] {
        self.assert_type(NumericType::F32);
        bytemuck_f32(&self.host)
    }

    pub fn as_f32_slice_mut(&mut self) -> &mut [f32] {
        self.assert_type(NumericType::F32);
        bytemuck_f32_mut(&mut self.host)
    }

    pub fn as_f64_slice(&self) -> &[f64] {
        self.assert_type(NumericType::F64);
        bytemuck_f64(&self.host)
    }

    pub fn as_u32_slice(&self) -> &[u32] {
        self.assert_type(NumericType::U32);
        bytemuck_u32(&self.host)
    }

    pub fn as_u32_slice_mut(&mut self) -> &mut [u32] {
        self.assert_type(NumericType::U32);
        bytemuck_u32_mut(&mut self.host)
    }

    pub fn as_i32_slice(&self) -> &[i32] {
        self.assert_type(NumericType::I32);
        bytemuck_i32(&self.host)
    }
}

// Small hand-rolled byte<->typed-slice views; this crate has no reason
// to pull in a crate for 4-byte-aligned reinterpretation of a `Vec<u8>`
// we allocated ourselves with `elem_size`-aligned length.
fn bytemuck_f32(bytes: &[u8]) -> &[f32] {
    debug_assert_eq!(bytes.len() % 4, 0);
    unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<f32>(), bytes.len() / 4) }
}
fn bytemuck_f32_mut(bytes: &mut [u8]) -> &mut [f32] {
    debug_assert_eq!(bytes.len() % 4, 0);
    unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr().cast::<f32>(), bytes.len() / 4) }
}
fn bytemuck_f64(bytes: &[u8]) -> &[f64] {
    debug_assert_eq!(bytes.len() % 8, 0);
    unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<f64>(), bytes.len() / 8) }
}
fn bytemuck_u32(bytes: &[u8]) -> &[u32] {
    debug_assert_eq!(bytes.len() % 4, 0);
    unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<u32>(), bytes.len() / 4) }
}
fn bytemuck_u32_mut(bytes: &mut [u8]) -> &mut [u32] {
    debug_assert_eq!(bytes.len() % 4, 0);
    unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr().cast::<u32>(), bytes.len() / 4) }
}
fn bytemuck_i32(bytes: &[u8]) -> &[i32] {
    debug_assert_eq!(bytes.len() % 4, 0);
    unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<i32>(), bytes.len() / 4) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_zeroed_storage_of_the_right_length() {
        let array = Array::allocate(NumericType::F32, 10, ArrayLocation::HostDevice);
        assert_eq!(array.as_f32_slice().len(), 10);
        assert!(array.as_f32_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn push_then_pull_round_trips_through_the_device_mirror() {
        let mut array = Array::allocate(NumericType::F32, 4, ArrayLocation::HostDevice);
        array.as_f32_slice_mut()[2] = 3.5;
        array.push();
        array.as_f32_slice_mut()[2] = 0.0;
        array.pull();
        assert_eq!(array.as_f32_slice()[2], 3.5);
    }

    #[test]
    fn free_empties_the_array() {
        let mut array = Array::allocate(NumericType::U32, 5, ArrayLocation::HostOnly);
        array.free();
        assert_eq!(array.len(), 0);
        assert!(array.host_bytes().is_empty());
    }
}
