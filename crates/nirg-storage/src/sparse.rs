//! Persisted layout for sparse (row-major compressed) synapse
//! connectivity: `rowLength` + `ind` + per-connection weight, with the
//! index array narrowed to the smallest width that fits `numPost`
//! (`spec.md` §6 `narrowSparseInd`).
//!
//! No magic number or checksum header: a persisted layout is only ever
//! read back by the same `nirg-runtime` build that wrote it, identified
//! externally by the model's own structural digest, so there is nothing
//! for a header to guard against.

use crate::cursor::{write_f32, write_u32, write_u8, Cursor};
use crate::error::{Result, StorageError};

/// The storage width chosen for the `ind` array, mirroring
/// `nirg_ir::NarrowIndexType` without this crate depending on `nirg-ir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IndexWidth {
    U8 = 0,
    U16 = 1,
    U32 = 2,
}

impl IndexWidth {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(IndexWidth::U8),
            1 => Ok(IndexWidth::U16),
            2 => Ok(IndexWidth::U32),
            other => Err(StorageError::UnknownTag { field: "index_width", tag: other }),
        }
    }
}

/// A fully decoded sparse connectivity layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseLayout {
    pub num_pre: u32,
    pub num_post: u32,
    pub index_width: IndexWidth,
    /// Length `num_pre`: connection count originating at each presynaptic
    /// neuron.
    pub row_length: Vec<u32>,
    /// Length `sum(row_length)`: postsynaptic target of each connection,
    /// row-major.
    pub ind: Vec<u32>,
    /// Length `sum(row_length)`: per-connection weight.
    pub weights: Vec<f32>,
}

impl SparseLayout {
    pub fn new(num_pre: u32, num_post: u32, index_width: IndexWidth) -> Self {
        Self { num_pre, num_post, index_width, row_length: vec![0; num_pre as usize], ind: Vec::new(), weights: Vec::new() }
    }

    fn validate_shape(&self) -> Result<()> {
        if self.row_length.len() != self.num_pre as usize {
            return Err(StorageError::Inconsistent(format!(
                "row_length has {} entries, expected num_pre={}",
                self.row_length.len(),
                self.num_pre
            )));
        }
        let total: u64 = self.row_length.iter().map(|&n| n as u64).sum();
        if self.ind.len() as u64 != total || self.weights.len() as u64 != total {
            return Err(StorageError::Inconsistent(format!(
                "ind/weights have {}/{} entries, row_length sums to {}",
                self.ind.len(),
                self.weights.len(),
                total
            )));
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate_shape()?;
        let mut out = Vec::new();
        write_u32(&mut out, self.num_pre);
        write_u32(&mut out, self.num_post);
        write_u8(&mut out, self.index_width as u8);
        for &len in &self.row_length {
            write_u32(&mut out, len);
        }
        for &idx in &self.ind {
            match self.index_width {
                IndexWidth::U8 => write_u8(&mut out, idx as u8),
                IndexWidth::U16 => out.extend_from_slice(&(idx as u16).to_le_bytes()),
                IndexWidth::U32 => write_u32(&mut out, idx),
            }
        }
        for &w in &self.weights {
            write_f32(&mut out, w);
        }
        Ok(out)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let num_pre = cursor.read_u32("num_pre")?;
        let num_post = cursor.read_u32("num_post")?;
        let index_width = IndexWidth::from_tag(cursor.read_u8("index_width")?)?;
        let mut row_length = Vec::with_capacity(num_pre as usize);
        for _ in 0..num_pre {
            row_length.push(cursor.read_u32("row_length entry")?);
        }
        let total: u64 = row_length.iter().map(|&n| n as u64).sum();
        let mut ind = Vec::with_capacity(total as usize);
        for _ in 0..total {
            let value = match index_width {
                IndexWidth::U8 => cursor.read_u8("ind entry")? as u32,
                IndexWidth::U16 => {
                    let lo = cursor.read_u8("ind entry low byte")? as u32;
                    let hi = cursor.read_u8("ind entry high byte")? as u32;
                    lo | (hi << 8)
                }
                IndexWidth::U32 => cursor.read_u32("ind entry")?,
            };
            ind.push(value);
        }
        let mut weights = Vec::with_capacity(total as usize);
        for _ in 0..total {
            weights.push(cursor.read_f32("weight entry")?);
        }
        let layout = Self { num_pre, num_post, index_width, row_length, ind, weights };
        layout.validate_shape()?;
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_small_layout() {
        let mut layout = SparseLayout::new(2, 3, IndexWidth::U8);
        layout.row_length = vec![2, 1];
        layout.ind = vec![0, 2, 1];
        layout.weights = vec![0.5, 1.0, -0.25];

        let bytes = layout.encode().unwrap();
        let decoded = SparseLayout::decode(&bytes).unwrap();
        assert_eq!(decoded, layout);
    }

    #[test]
    fn rejects_mismatched_row_length_sum() {
        let mut layout = SparseLayout::new(1, 1, IndexWidth::U32);
        layout.row_length = vec![2];
        layout.ind = vec![0];
        layout.weights = vec![1.0];
        assert!(layout.encode().is_err());
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let layout = SparseLayout::new(0, 0, IndexWidth::U32);
        let mut bytes = layout.encode().unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(SparseLayout::decode(&bytes).is_err());
    }
}
