//! Key hierarchy: master key → section key (per epoch) → sector key (per sub-epoch)

use decvol_core::{CipherVariant, DecError, DecResult};
use rand::RngCore;
use zeroize::Zeroize;

use crate::kdf;
use crate::label::PackedBlock;
use crate::KEY_SIZE;

/// The volume master key together with the cipher it keys.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct BlockCipherKey {
    variant: CipherVariant,
    bytes: [u8; KEY_SIZE],
}

impl BlockCipherKey {
    pub fn from_bytes(variant: CipherVariant, bytes: [u8; KEY_SIZE]) -> Self {
        Self { variant, bytes }
    }

    pub fn from_slice(variant: CipherVariant, bytes: &[u8]) -> DecResult<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| DecError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self::from_bytes(variant, bytes))
    }

    /// Generate a random 256-bit master key.
    pub fn generate(variant: CipherVariant) -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(variant, bytes)
    }

    pub fn variant(&self) -> CipherVariant {
        self.variant
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for BlockCipherKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for BlockCipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCipherKey")
            .field("variant", &self.variant)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Key of one section for one epoch. Zeroized on drop.
pub struct SectionKey {
    variant: CipherVariant,
    bytes: [u8; KEY_SIZE],
}

impl SectionKey {
    pub fn variant(&self) -> CipherVariant {
        self.variant
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SectionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionKey")
            .field("variant", &self.variant)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Key of one sector for one sub-epoch. Zeroized on drop.
pub struct SectorKey {
    variant: CipherVariant,
    bytes: [u8; KEY_SIZE],
}

impl SectorKey {
    pub fn variant(&self) -> CipherVariant {
        self.variant
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SectorKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SectorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectorKey")
            .field("variant", &self.variant)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive the key of `section` at `epoch` (its section counter).
///
/// Label = `{ high: epoch, low: section }`, context = 0.
pub fn derive_section_key(
    master: &BlockCipherKey,
    section: u64,
    epoch: u64,
) -> DecResult<SectionKey> {
    let bytes = kdf::derive(
        master.variant,
        &master.bytes,
        PackedBlock::new(epoch, section),
        PackedBlock::ZERO,
    )?;
    Ok(SectionKey {
        variant: master.variant,
        bytes: *bytes,
    })
}

/// Derive the key of `sector` within `section` for a sector counter value.
///
/// Label = `{ high: counter / rekey_frequency, low: sector }`,
/// context = `{ high: section, low: 0 }`. Counters within the same
/// `rekey_frequency` window share a key; their keystream offsets differ.
pub fn derive_sector_key(
    section_key: &SectionKey,
    section: u64,
    sector: u64,
    counter: u64,
    rekey_frequency: u64,
) -> DecResult<SectorKey> {
    let bytes = kdf::derive(
        section_key.variant,
        &section_key.bytes,
        PackedBlock::new(counter / rekey_frequency, sector),
        PackedBlock::new(section, 0),
    )?;
    Ok(SectorKey {
        variant: section_key.variant,
        bytes: *bytes,
    })
}
