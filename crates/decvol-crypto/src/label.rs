//! Two-half block values used as KDF labels, KDF contexts and keystream counters
//!
//! Encoding follows the little-endian machine layout of the block:
//! ```text
//! narrow (8 bytes):  LE64( high << 32 | low )      high, low < 2^32
//! wide   (16 bytes): LE64( low ) || LE64( high )
//! ```

use decvol_core::CipherVariant;

use crate::cipher::Block;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedBlock {
    pub high: u64,
    pub low: u64,
}

impl PackedBlock {
    pub const ZERO: PackedBlock = PackedBlock { high: 0, low: 0 };

    pub fn new(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    pub fn encode(&self, variant: CipherVariant) -> Block {
        match variant {
            CipherVariant::Narrow => {
                debug_assert!(
                    self.high <= u32::MAX as u64 && self.low <= u32::MAX as u64,
                    "narrow block halves must fit in 32 bits: {self:?}"
                );
                let packed = (self.high << 32) | (self.low & u32::MAX as u64);
                Block::from_slice(&packed.to_le_bytes())
            }
            CipherVariant::Wide => {
                let mut bytes = [0u8; 16];
                bytes[..8].copy_from_slice(&self.low.to_le_bytes());
                bytes[8..].copy_from_slice(&self.high.to_le_bytes());
                Block::from_slice(&bytes)
            }
        }
    }
}
