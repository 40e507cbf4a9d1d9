//! Per-section and per-sector encryption counters
//!
//! Section counters number the epochs of each section key; sector counters
//! record how many times each sector has been encrypted within the current
//! epoch. Both are bounded by the half-block width of the cipher.

use decvol_core::{CipherVariant, DecError, DecResult, Geometry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    variant: CipherVariant,
    sectors_per_section: u64,
    sections: Vec<u64>,
    sectors: Vec<u64>,
}

impl CounterState {
    /// All-zero counters for a freshly initialised volume.
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            variant: geometry.variant(),
            sectors_per_section: geometry.sectors_per_section(),
            sections: vec![0; geometry.sections() as usize],
            sectors: vec![0; geometry.sector_count()],
        }
    }

    /// Build from existing counter arrays; checked against a geometry on use.
    pub fn from_parts(
        variant: CipherVariant,
        sectors_per_section: u64,
        sections: Vec<u64>,
        sectors: Vec<u64>,
    ) -> Self {
        Self {
            variant,
            sectors_per_section,
            sections,
            sectors,
        }
    }

    pub fn variant(&self) -> CipherVariant {
        self.variant
    }

    /// # Panics
    ///
    /// If `section` is out of range for this state; see [`CounterState::check`].
    pub fn section(&self, section: u64) -> u64 {
        self.sections[section as usize]
    }

    /// # Panics
    ///
    /// If `section` or `sector` is out of range for this state.
    pub fn sector(&self, section: u64, sector: u64) -> u64 {
        self.sectors[self.index(section, sector)]
    }

    pub fn section_counters(&self) -> &[u64] {
        &self.sections
    }

    pub fn sector_counters(&self) -> &[u64] {
        &self.sectors
    }

    #[cfg(test)]
    pub(crate) fn set_section(&mut self, section: u64, value: u64) {
        self.sections[section as usize] = value;
    }

    pub(crate) fn set_sector(&mut self, section: u64, sector: u64, value: u64) {
        let idx = self.index(section, sector);
        self.sectors[idx] = value;
    }

    /// Advance a sector counter, returning the new value.
    pub(crate) fn increment_sector(&mut self, section: u64, sector: u64) -> u64 {
        let idx = self.index(section, sector);
        self.sectors[idx] += 1;
        self.sectors[idx]
    }

    pub(crate) fn reset_sector(&mut self, section: u64, sector: u64) {
        self.set_sector(section, sector, 0);
    }

    pub(crate) fn increment_section(&mut self, section: u64) {
        self.sections[section as usize] += 1;
    }

    /// Verify these counters fit `geometry`: same cipher width, matching
    /// array lengths, and every value representable in the counter width.
    pub fn check(&self, geometry: &Geometry) -> DecResult<()> {
        if self.variant != geometry.variant() {
            return Err(DecError::CounterWidthMismatch {
                expected: geometry.variant().half_bits(),
                actual: self.variant.half_bits(),
            });
        }
        if self.sections.len() != geometry.sections() as usize {
            return Err(DecError::BufferLength {
                what: "section counters",
                expected: geometry.sections() as usize,
                actual: self.sections.len(),
            });
        }
        if self.sectors_per_section != geometry.sectors_per_section()
            || self.sectors.len() != geometry.sector_count()
        {
            return Err(DecError::BufferLength {
                what: "sector counters",
                expected: geometry.sector_count(),
                actual: self.sectors.len(),
            });
        }

        let max = geometry.counter_max();
        let bits = geometry.variant().half_bits();
        if let Some((index, &value)) = self.sections.iter().enumerate().find(|&(_, &c)| c > max) {
            return Err(DecError::CounterOutOfRange {
                what: "section",
                index,
                value,
                bits,
            });
        }
        if let Some((index, &value)) = self.sectors.iter().enumerate().find(|&(_, &c)| c > max) {
            return Err(DecError::CounterOutOfRange {
                what: "sector",
                index,
                value,
                bits,
            });
        }
        Ok(())
    }

    fn index(&self, section: u64, sector: u64) -> usize {
        (section * self.sectors_per_section + sector) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decvol_core::OperationParameters;

    fn narrow_geometry() -> Geometry {
        OperationParameters::new(2, 4, 1, 16).validate(8).unwrap()
    }

    #[test]
    fn test_new_is_zeroed() {
        let counters = CounterState::new(&narrow_geometry());
        assert_eq!(counters.section_counters(), &[0, 0]);
        assert_eq!(counters.sector_counters().len(), 8);
        assert!(counters.sector_counters().iter().all(|&c| c == 0));
        assert!(counters.check(&narrow_geometry()).is_ok());
    }

    #[test]
    fn test_sector_indexing() {
        let mut counters = CounterState::new(&narrow_geometry());
        counters.set_sector(1, 2, 9);
        assert_eq!(counters.sector_counters()[6], 9);
        assert_eq!(counters.sector(1, 2), 9);
        assert_eq!(counters.increment_sector(1, 2), 10);
        counters.reset_sector(1, 2);
        assert_eq!(counters.sector(1, 2), 0);

        counters.increment_section(1);
        assert_eq!(counters.section(1), 1);
        assert_eq!(counters.section(0), 0);
    }

    #[test]
    fn test_check_variant_mismatch() {
        let wide = OperationParameters::new(2, 4, 1, 32).validate(16).unwrap();
        let counters = CounterState::new(&wide);
        assert!(matches!(
            counters.check(&narrow_geometry()),
            Err(DecError::CounterWidthMismatch { expected: 32, actual: 64 })
        ));
    }

    #[test]
    fn test_check_lengths() {
        let counters =
            CounterState::from_parts(CipherVariant::Narrow, 4, vec![0], vec![0; 8]);
        assert!(matches!(
            counters.check(&narrow_geometry()),
            Err(DecError::BufferLength { what: "section counters", expected: 2, actual: 1 })
        ));

        let counters =
            CounterState::from_parts(CipherVariant::Narrow, 4, vec![0, 0], vec![0; 7]);
        assert!(matches!(
            counters.check(&narrow_geometry()),
            Err(DecError::BufferLength { what: "sector counters", .. })
        ));
    }

    #[test]
    fn test_check_counter_range() {
        let mut counters = CounterState::new(&narrow_geometry());
        counters.set_sector(0, 3, u32::MAX as u64 + 1);
        assert!(matches!(
            counters.check(&narrow_geometry()),
            Err(DecError::CounterOutOfRange { what: "sector", index: 3, bits: 32, .. })
        ));

        let mut counters = CounterState::new(&narrow_geometry());
        counters.set_section(1, u64::MAX);
        assert!(matches!(
            counters.check(&narrow_geometry()),
            Err(DecError::CounterOutOfRange { what: "section", index: 1, .. })
        ));

        // the maximum itself is representable
        let mut counters = CounterState::new(&narrow_geometry());
        counters.set_sector(0, 0, u32::MAX as u64);
        assert!(counters.check(&narrow_geometry()).is_ok());
    }

    #[test]
    fn test_serde_json() {
        let mut counters = CounterState::new(&narrow_geometry());
        counters.set_section(0, 3);
        counters.set_sector(1, 1, 42);

        let json = serde_json::to_string(&counters).unwrap();
        assert!(json.contains("\"magma\""));
        let parsed: CounterState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, counters);
    }
}
