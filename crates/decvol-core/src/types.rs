use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::{DecError, DecResult};

/// Block cipher underlying the construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherVariant {
    /// 64-bit block (Magma, GOST R 34.12-2015)
    #[serde(rename = "magma", alias = "narrow")]
    Narrow,
    /// 128-bit block (Kuznyechik, GOST R 34.12-2015)
    #[serde(rename = "kuznyechik", alias = "wide")]
    Wide,
}

impl CipherVariant {
    pub fn from_block_width(bytes: usize) -> DecResult<Self> {
        match bytes {
            8 => Ok(CipherVariant::Narrow),
            16 => Ok(CipherVariant::Wide),
            other => Err(DecError::InvalidBlockWidth(other)),
        }
    }

    /// Block width in bytes
    pub fn block_width(self) -> usize {
        match self {
            CipherVariant::Narrow => 8,
            CipherVariant::Wide => 16,
        }
    }

    /// Width of one half of a block, which is also the width of every counter
    pub fn half_bits(self) -> u32 {
        (self.block_width() as u32) * 4
    }

    /// Largest value a section or sector counter may hold
    pub fn counter_max(self) -> u64 {
        match self {
            CipherVariant::Narrow => u32::MAX as u64,
            CipherVariant::Wide => u64::MAX,
        }
    }

    /// Modulus the partitioning parameters must divide: `2 * 2^(block_width / 2)`.
    pub fn partition_range(self) -> u64 {
        2u64 << (self.block_width() / 2)
    }

    pub fn name(self) -> &'static str {
        match self {
            CipherVariant::Narrow => "magma",
            CipherVariant::Wide => "kuznyechik",
        }
    }
}

impl std::fmt::Display for CipherVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Caller-supplied volume layout and rekeying parameters (w, s, v, l)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationParameters {
    /// Number of sections the volume is split into (w)
    pub sections: u64,
    /// Number of sectors in every section (s)
    pub sectors_per_section: u64,
    /// Encryptions served by one sector key before a new sub-epoch key (v)
    pub rekey_frequency: u64,
    /// Sector length in bytes (l)
    pub sector_len: u64,
}

impl OperationParameters {
    pub fn new(
        sections: u64,
        sectors_per_section: u64,
        rekey_frequency: u64,
        sector_len: u64,
    ) -> Self {
        Self {
            sections,
            sectors_per_section,
            rekey_frequency,
            sector_len,
        }
    }

    /// Check every invariant for a cipher of `block_width` bytes.
    ///
    /// Checks run in a fixed order so the first violated invariant is the one reported.
    pub fn validate(&self, block_width: usize) -> DecResult<Geometry> {
        let variant = CipherVariant::from_block_width(block_width)?;
        let width = block_width as u64;

        if self.sector_len == 0 || self.sector_len % width != 0 {
            return Err(DecError::InvalidSectorLength {
                len: self.sector_len,
                block: block_width,
            });
        }
        let q = self.sector_len / width;
        let range = variant.partition_range();

        let divides = |value: u64| value != 0 && range % value == 0;
        if !divides(q) {
            return Err(DecError::InvalidPartitioning {
                what: "blocks per sector",
                value: q,
                range,
            });
        }
        if !divides(self.sections) {
            return Err(DecError::InvalidPartitioning {
                what: "sections",
                value: self.sections,
                range,
            });
        }
        if !divides(self.sectors_per_section) {
            return Err(DecError::InvalidPartitioning {
                what: "sectors per section",
                value: self.sectors_per_section,
                range,
            });
        }

        let within = self
            .rekey_frequency
            .checked_mul(q)
            .is_some_and(|vq| vq <= range);
        if self.rekey_frequency == 0 || !within {
            return Err(DecError::InvalidRekeyFrequency {
                v: self.rekey_frequency,
                q,
                range,
            });
        }

        Ok(Geometry {
            variant,
            params: *self,
            blocks_per_sector: q,
        })
    }
}

/// Validated parameters together with the quantities derived from them.
///
/// Only obtainable through [`OperationParameters::validate`], so every value
/// here is bounded by the partition range and index arithmetic cannot overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    variant: CipherVariant,
    params: OperationParameters,
    blocks_per_sector: u64,
}

impl Geometry {
    pub fn new(variant: CipherVariant, params: OperationParameters) -> DecResult<Self> {
        params.validate(variant.block_width())
    }

    pub fn variant(&self) -> CipherVariant {
        self.variant
    }

    pub fn params(&self) -> &OperationParameters {
        &self.params
    }

    pub fn sections(&self) -> u64 {
        self.params.sections
    }

    pub fn sectors_per_section(&self) -> u64 {
        self.params.sectors_per_section
    }

    pub fn rekey_frequency(&self) -> u64 {
        self.params.rekey_frequency
    }

    pub fn block_width(&self) -> usize {
        self.variant.block_width()
    }

    /// q = l / block width
    pub fn blocks_per_sector(&self) -> u64 {
        self.blocks_per_sector
    }

    pub fn sector_len(&self) -> usize {
        self.params.sector_len as usize
    }

    /// Total number of sectors, and the length of the sector counter array
    pub fn sector_count(&self) -> usize {
        (self.params.sections * self.params.sectors_per_section) as usize
    }

    /// Bytes covered by one call: w * s * l
    pub fn volume_len(&self) -> usize {
        self.sector_count() * self.sector_len()
    }

    pub fn counter_max(&self) -> u64 {
        self.variant.counter_max()
    }

    /// Position of sector `(section, sector)` in the sector counter array
    pub fn counter_index(&self, section: u64, sector: u64) -> usize {
        (section * self.params.sectors_per_section + sector) as usize
    }

    pub fn sector_range(&self, section: u64, sector: u64) -> Range<usize> {
        let start = self.counter_index(section, sector) * self.sector_len();
        start..start + self.sector_len()
    }

    pub fn section_range(&self, section: u64) -> Range<usize> {
        let len = self.params.sectors_per_section as usize * self.sector_len();
        let start = section as usize * len;
        start..start + len
    }

    /// Absolute keystream offset of block `t` of a sector whose counter is `counter`.
    ///
    /// Computed modulo 2^(half width): the offset occupies the low half of the counter block.
    pub fn block_offset(&self, counter: u64, t: u64) -> u64 {
        let n = counter
            .wrapping_mul(self.blocks_per_sector)
            .wrapping_add(t);
        n & self.variant.counter_max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_width_variants() {
        assert_eq!(CipherVariant::from_block_width(8).unwrap(), CipherVariant::Narrow);
        assert_eq!(CipherVariant::from_block_width(16).unwrap(), CipherVariant::Wide);
        assert!(matches!(
            CipherVariant::from_block_width(32),
            Err(DecError::InvalidBlockWidth(32))
        ));
        assert_eq!(CipherVariant::Narrow.half_bits(), 32);
        assert_eq!(CipherVariant::Wide.half_bits(), 64);
    }

    #[test]
    fn test_partition_range() {
        assert_eq!(CipherVariant::Narrow.partition_range(), 32);
        assert_eq!(CipherVariant::Wide.partition_range(), 512);
    }

    #[test]
    fn test_reference_parameters_are_valid() {
        let geometry = OperationParameters::new(1, 2, 3, 16).validate(8).unwrap();
        assert_eq!(geometry.blocks_per_sector(), 2);
        assert_eq!(geometry.volume_len(), 32);
        assert_eq!(geometry.sector_count(), 2);

        let geometry = OperationParameters::new(1, 2, 3, 32).validate(16).unwrap();
        assert_eq!(geometry.blocks_per_sector(), 2);
        assert_eq!(geometry.volume_len(), 64);
    }

    #[test]
    fn test_rejects_bad_block_width() {
        let result = OperationParameters::new(1, 2, 3, 16).validate(12);
        assert!(matches!(result, Err(DecError::InvalidBlockWidth(12))));
    }

    #[test]
    fn test_rejects_sector_length() {
        let result = OperationParameters::new(1, 2, 3, 20).validate(8);
        assert!(matches!(result, Err(DecError::InvalidSectorLength { len: 20, block: 8 })));

        let result = OperationParameters::new(1, 2, 3, 0).validate(16);
        assert!(matches!(result, Err(DecError::InvalidSectorLength { .. })));
    }

    #[test]
    fn test_rejects_partitioning() {
        // q = 3 does not divide 32
        let result = OperationParameters::new(1, 2, 1, 24).validate(8);
        assert!(matches!(
            result,
            Err(DecError::InvalidPartitioning { what: "blocks per sector", value: 3, .. })
        ));

        let result = OperationParameters::new(3, 2, 1, 16).validate(8);
        assert!(matches!(
            result,
            Err(DecError::InvalidPartitioning { what: "sections", value: 3, .. })
        ));

        let result = OperationParameters::new(1, 0, 1, 16).validate(8);
        assert!(matches!(
            result,
            Err(DecError::InvalidPartitioning { what: "sectors per section", .. })
        ));
    }

    #[test]
    fn test_rejects_rekey_frequency() {
        // v * q = 17 * 2 = 34 > 32
        let result = OperationParameters::new(1, 2, 17, 16).validate(8);
        assert!(matches!(
            result,
            Err(DecError::InvalidRekeyFrequency { v: 17, q: 2, range: 32 })
        ));

        // v * q = 16 * 2 = 32 is the boundary and still valid
        assert!(OperationParameters::new(1, 2, 16, 16).validate(8).is_ok());

        let result = OperationParameters::new(1, 2, 0, 16).validate(8);
        assert!(matches!(result, Err(DecError::InvalidRekeyFrequency { v: 0, .. })));
    }

    #[test]
    fn test_sector_ranges() {
        let geometry = OperationParameters::new(2, 4, 1, 32).validate(16).unwrap();
        assert_eq!(geometry.counter_index(1, 2), 6);
        assert_eq!(geometry.sector_range(1, 2), 192..224);
        assert_eq!(geometry.section_range(1), 128..256);
        assert_eq!(geometry.volume_len(), 256);
    }

    #[test]
    fn test_block_offset_wraps_at_half_width() {
        let geometry = OperationParameters::new(1, 2, 3, 16).validate(8).unwrap();
        assert_eq!(geometry.block_offset(5, 1), 11);
        // 2^31 * 2 wraps to zero in the 32-bit half
        assert_eq!(geometry.block_offset(1 << 31, 1), 1);
    }

    #[test]
    fn test_variant_serde_names() {
        #[derive(Deserialize)]
        struct Holder {
            cipher: CipherVariant,
        }
        let h: Holder = toml::from_str(r#"cipher = "kuznyechik""#).unwrap();
        assert_eq!(h.cipher, CipherVariant::Wide);
        let h: Holder = toml::from_str(r#"cipher = "narrow""#).unwrap();
        assert_eq!(h.cipher, CipherVariant::Narrow);
    }
}
