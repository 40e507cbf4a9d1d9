//! Counter-mode keystream for one sector
//!
//! Block `t` of sector `i` with sector counter `c` is masked with
//! `E_{sector key}( { high: i, low: c * q + t } )`.

use decvol_core::{DecResult, Geometry};

use crate::cipher::{Block, KeyedCipher};
use crate::keys::SectorKey;
use crate::label::PackedBlock;

/// Produce one keystream block with a freshly keyed cipher.
pub fn keystream_block(key: &SectorKey, sector: u64, offset: u64) -> DecResult<Block> {
    SectorKeystream::new(key, sector)?.block(offset)
}

/// A cipher keyed for one sector, reusable across the blocks of that sector.
#[derive(Debug)]
pub struct SectorKeystream {
    cipher: KeyedCipher,
    sector: u64,
}

impl SectorKeystream {
    pub fn new(key: &SectorKey, sector: u64) -> DecResult<Self> {
        Ok(Self {
            cipher: KeyedCipher::new(key.variant(), key.as_bytes())?,
            sector,
        })
    }

    pub fn block(&self, offset: u64) -> DecResult<Block> {
        let variant = self.cipher.variant();
        let input = PackedBlock::new(self.sector, offset).encode(variant);
        Ok(self.cipher.encrypt(&input))
    }

    /// XOR the keystream for `counter` into one sector's worth of data.
    pub fn apply(&self, data: &mut [u8], geometry: &Geometry, counter: u64) -> DecResult<()> {
        for (t, chunk) in data.chunks_mut(geometry.block_width()).enumerate() {
            let mask = self.block(geometry.block_offset(counter, t as u64))?;
            for (b, m) in chunk.iter_mut().zip(mask.as_bytes()) {
                *b ^= m;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{derive_sector_key, derive_section_key, BlockCipherKey};
    use decvol_core::{CipherVariant, OperationParameters};

    fn sector_key(variant: CipherVariant) -> SectorKey {
        let master = BlockCipherKey::from_bytes(variant, [9u8; 32]);
        let section = derive_section_key(&master, 0, 0).unwrap();
        derive_sector_key(&section, 0, 1, 0, 1).unwrap()
    }

    #[test]
    fn test_one_shot_matches_reusable() {
        for variant in [CipherVariant::Narrow, CipherVariant::Wide] {
            let key = sector_key(variant);
            let ks = SectorKeystream::new(&key, 1).unwrap();
            for offset in [0, 1, 7] {
                assert_eq!(
                    keystream_block(&key, 1, offset).unwrap(),
                    ks.block(offset).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_offsets_and_sectors_differ() {
        let key = sector_key(CipherVariant::Narrow);
        let a = keystream_block(&key, 0, 0).unwrap();
        let b = keystream_block(&key, 0, 1).unwrap();
        let c = keystream_block(&key, 1, 0).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn test_apply_is_involution() {
        let geometry = OperationParameters::new(1, 2, 3, 32).validate(16).unwrap();
        let key = sector_key(CipherVariant::Wide);
        let ks = SectorKeystream::new(&key, 1).unwrap();

        let original: Vec<u8> = (0..32).collect();
        let mut data = original.clone();
        ks.apply(&mut data, &geometry, 4).unwrap();
        assert_ne!(data, original);
        ks.apply(&mut data, &geometry, 4).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn test_apply_uses_counter_offsets() {
        let geometry = OperationParameters::new(1, 2, 3, 16).validate(8).unwrap();
        let key = sector_key(CipherVariant::Narrow);
        let ks = SectorKeystream::new(&key, 0).unwrap();

        // counter 1 with q = 2 starts at offset 2
        let mut data = [0u8; 16];
        ks.apply(&mut data, &geometry, 1).unwrap();
        assert_eq!(&data[..8], ks.block(2).unwrap().as_bytes());
        assert_eq!(&data[8..], ks.block(3).unwrap().as_bytes());
    }
}
