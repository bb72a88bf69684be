//! Persisted layout for the spike-recording buffer (`spec.md` §6, §8
//! scenario 6): `ceil(N/32) * batchSize * numRecordingTimesteps` words,
//! row-major by `(timestep, batch, word)`.

use crate::cursor::{write_u32, Cursor};
use crate::error::{Result, StorageError};

fn words_per_row(num_neurons: u32) -> usize {
    ((num_neurons as u64 + 31) / 32) as usize
}

/// A fully decoded recording buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingBuffer {
    pub num_neurons: u32,
    pub batch_size: u32,
    pub num_timesteps: u32,
    words: Vec<u32>,
}

impl RecordingBuffer {
    /// A new, all-zero buffer sized for `num_neurons` neurons over
    /// `batch_size` batches and `num_timesteps` recorded steps.
    pub fn new(num_neurons: u32, batch_size: u32, num_timesteps: u32) -> Self {
        let total = words_per_row(num_neurons) * batch_size as usize * num_timesteps as usize;
        Self { num_neurons, batch_size, num_timesteps, words: vec![0u32; total] }
    }

    /// Total word count, matching `spec.md` §8 scenario 6's formula.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    fn row_offset(&self, timestep: u32, batch: u32) -> usize {
        assert!(timestep < self.num_timesteps, "timestep {timestep} out of range");
        assert!(batch < self.batch_size, "batch {batch} out of range");
        let wpr = words_per_row(self.num_neurons);
        (timestep as usize * self.batch_size as usize + batch as usize) * wpr
    }

    pub fn set_spike(&mut self, timestep: u32, batch: u32, neuron: u32, spiked: bool) {
        assert!(neuron < self.num_neurons, "neuron {neuron} out of range");
        let offset = self.row_offset(timestep, batch) + (neuron as usize / 32);
        let bit = neuron % 32;
        if spiked {
            self.words[offset] |= 1 << bit;
        } else {
            self.words[offset] &= !(1 << bit);
        }
    }

    pub fn get_spike(&self, timestep: u32, batch: u32, neuron: u32) -> bool {
        assert!(neuron < self.num_neurons, "neuron {neuron} out of range");
        let offset = self.row_offset(timestep, batch) + (neuron as usize / 32);
        (self.words[offset] >> (neuron % 32)) & 1 != 0
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_u32(&mut out, self.num_neurons);
        write_u32(&mut out, self.batch_size);
        write_u32(&mut out, self.num_timesteps);
        for &word in &self.words {
            write_u32(&mut out, word);
        }
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let num_neurons = cursor.read_u32("num_neurons")?;
        let batch_size = cursor.read_u32("batch_size")?;
        let num_timesteps = cursor.read_u32("num_timesteps")?;
        let expected = words_per_row(num_neurons) * batch_size as usize * num_timesteps as usize;
        let mut words = Vec::with_capacity(expected);
        for _ in 0..expected {
            words.push(cursor.read_u32("recording word")?);
        }
        if cursor.remaining() != 0 {
            return Err(StorageError::Inconsistent(format!("{} trailing bytes after recording payload", cursor.remaining())));
        }
        Ok(Self { num_neurons, batch_size, num_timesteps, words })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_matches_spec_scenario_six() {
        // N=70, batchSize=4, numRecordingTimesteps=1000 => 3*4*1000 = 12000.
        let buffer = RecordingBuffer::new(70, 4, 1000);
        assert_eq!(buffer.word_count(), 12_000);
    }

    #[test]
    fn set_and_get_round_trip_a_spike() {
        let mut buffer = RecordingBuffer::new(40, 2, 3);
        buffer.set_spike(2, 1, 39, true);
        assert!(buffer.get_spike(2, 1, 39));
        assert!(!buffer.get_spike(2, 1, 38));
        assert!(!buffer.get_spike(2, 0, 39));
    }

    #[test]
    fn encode_decode_round_trips() {
        let mut buffer = RecordingBuffer::new(70, 4, 5);
        buffer.set_spike(4, 3, 69, true);
        buffer.set_spike(0, 0, 0, true);
        let bytes = buffer.encode();
        let decoded = RecordingBuffer::decode(&bytes).unwrap();
        assert_eq!(decoded, buffer);
    }
}
