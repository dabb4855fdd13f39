//! Bit cursors for TEDS streams
//!
//! TEDS fields are packed back to back with the least significant bit of
//! every field first. The cursors below keep the stream as plain bools,
//! which mirrors how virtual TEDS files store one bit per byte.

use super::TedsError;

/// Sequential reader over a TEDS bit stream
#[derive(Debug, Clone)]
pub struct BitReader {
    bits: Vec<bool>,
    pos: usize,
}

impl BitReader {
    pub fn new(bits: Vec<bool>) -> Self {
        Self { bits, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bits.len() - self.pos
    }

    /// Take the next `count` bits without interpreting them
    pub fn read_raw(&mut self, count: usize) -> Result<&[bool], TedsError> {
        if count > self.remaining() {
            return Err(TedsError::UnexpectedEnd {
                wanted: count,
                position: self.pos,
                available: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += count;
        Ok(&self.bits[start..self.pos])
    }

    /// Read an unsigned integer stored LSB first
    pub fn read_uint(&mut self, count: usize) -> Result<u64, TedsError> {
        if count > 64 {
            return Err(TedsError::FieldTooWide(count));
        }
        let raw = self.read_raw(count)?;
        Ok(lsb_first_to_uint(raw))
    }

    /// Read an unsigned integer stored MSB first (used by the NI preamble)
    pub fn read_uint_msb(&mut self, count: usize) -> Result<u64, TedsError> {
        if count > 64 {
            return Err(TedsError::FieldTooWide(count));
        }
        let raw = self.read_raw(count)?;
        Ok(raw.iter().fold(0u64, |acc, &b| (acc << 1) | u64::from(b)))
    }
}

/// Append-only writer producing a TEDS bit stream
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bits: Vec<bool>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Append `count` bits of `value`, LSB first
    pub fn push_uint(&mut self, value: u64, count: usize) -> Result<(), TedsError> {
        if count > 64 {
            return Err(TedsError::FieldTooWide(count));
        }
        if count < 64 && value >> count != 0 {
            return Err(TedsError::ValueOutOfRange {
                value: value as f64,
                bits: count,
            });
        }
        self.bits.extend((0..count).map(|i| (value >> i) & 1 == 1));
        Ok(())
    }

    /// Append `count` bits of `value`, MSB first
    pub fn push_uint_msb(&mut self, value: u64, count: usize) -> Result<(), TedsError> {
        if count > 64 {
            return Err(TedsError::FieldTooWide(count));
        }
        self.bits.extend((0..count).rev().map(|i| (value >> i) & 1 == 1));
        Ok(())
    }

    pub fn extend(&mut self, other: BitWriter) {
        self.bits.extend(other.bits);
    }

    pub fn into_bits(self) -> Vec<bool> {
        self.bits
    }
}

fn lsb_first_to_uint(bits: &[bool]) -> u64 {
    bits.iter()
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << i))
}

/// Expand the byte list a DAQ driver reports for hardware TEDS into bits.
///
/// Every byte contributes eight bits, least significant first.
pub fn bits_from_daq_bytes(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).map(move |i| (byte >> i) & 1 == 1))
        .collect()
}
