//! Whole-volume encrypt, decrypt and section rotation
//!
//! Every entry point validates parameters, buffers and counters before any
//! data or counter is modified. Two-buffer forms copy the input into the
//! output and then operate in place.

use std::ops::Range;

use decvol_core::{DecError, DecResult, Geometry, OperationParameters};
use tracing::{debug, info, trace, warn};

use crate::counters::CounterState;
use crate::keys::{derive_section_key, derive_sector_key, BlockCipherKey, SectionKey};
use crate::keystream::SectorKeystream;

/// A master key bound to a validated volume geometry.
#[derive(Debug)]
pub struct DecMode<'k> {
    key: &'k BlockCipherKey,
    geometry: Geometry,
}

impl<'k> DecMode<'k> {
    /// Validate `params` against the key's block width.
    ///
    /// Buffers are checked per call, so this reports parameter errors only. The
    /// free functions [`encrypt`], [`decrypt`] and [`reencrypt_section`] report a
    /// missing buffer ahead of any parameter error.
    pub fn new(key: &'k BlockCipherKey, params: &OperationParameters) -> DecResult<Self> {
        let geometry = params.validate(key.variant().block_width())?;
        Ok(Self { key, geometry })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Encrypt `input` into `output`, advancing every sector counter by one.
    pub fn encrypt(
        &self,
        input: &[u8],
        output: &mut [u8],
        counters: &mut CounterState,
    ) -> DecResult<()> {
        self.check_buffer("input", input)?;
        self.check_buffer("output", output)?;
        self.check_encrypt_counters(counters)?;
        output.copy_from_slice(input);
        self.encrypt_volume(output, counters)
    }

    pub fn encrypt_in_place(&self, data: &mut [u8], counters: &mut CounterState) -> DecResult<()> {
        self.check_buffer("data", data)?;
        self.check_encrypt_counters(counters)?;
        self.encrypt_volume(data, counters)
    }

    /// Decrypt with the counters as they stood after the matching encrypt.
    pub fn decrypt(
        &self,
        input: &[u8],
        output: &mut [u8],
        counters: &CounterState,
    ) -> DecResult<()> {
        self.check_buffer("input", input)?;
        self.check_buffer("output", output)?;
        counters.check(&self.geometry)?;
        output.copy_from_slice(input);
        self.decrypt_volume(output, counters)
    }

    pub fn decrypt_in_place(&self, data: &mut [u8], counters: &CounterState) -> DecResult<()> {
        self.check_buffer("data", data)?;
        counters.check(&self.geometry)?;
        self.decrypt_volume(data, counters)
    }

    /// Move section `section` of the ciphertext to the next key epoch.
    ///
    /// The plaintext is never reconstructed in full: each block has the old
    /// and the new keystream XORed into it. Other sections pass through.
    pub fn reencrypt_section(
        &self,
        input: &[u8],
        output: &mut [u8],
        counters: &mut CounterState,
        section: u64,
    ) -> DecResult<()> {
        self.check_buffer("input", input)?;
        self.check_buffer("output", output)?;
        self.check_rotation(counters, section)?;
        output.copy_from_slice(input);
        self.rotate_section(output, counters, section, 0..self.geometry.sectors_per_section())
    }

    pub fn reencrypt_section_in_place(
        &self,
        data: &mut [u8],
        counters: &mut CounterState,
        section: u64,
    ) -> DecResult<()> {
        self.check_buffer("data", data)?;
        self.check_rotation(counters, section)?;
        self.rotate_section(data, counters, section, 0..self.geometry.sectors_per_section())
    }

    fn check_buffer(&self, what: &'static str, buf: &[u8]) -> DecResult<()> {
        require_buffer(what, buf)?;
        let expected = self.geometry.volume_len();
        if buf.len() != expected {
            return Err(DecError::BufferLength {
                what,
                expected,
                actual: buf.len(),
            });
        }
        Ok(())
    }

    /// Counter checks for encrypt, including a section that would need a
    /// forced rotation it can no longer perform.
    fn check_encrypt_counters(&self, counters: &CounterState) -> DecResult<()> {
        counters.check(&self.geometry)?;
        let max = self.geometry.counter_max();
        for j in 0..self.geometry.sections() {
            let overflows =
                (0..self.geometry.sectors_per_section()).any(|i| counters.sector(j, i) == max);
            if overflows && counters.section(j) == max {
                return Err(DecError::KeyExhausted { section: j });
            }
        }
        Ok(())
    }

    fn check_rotation(&self, counters: &CounterState, section: u64) -> DecResult<()> {
        counters.check(&self.geometry)?;
        if section >= self.geometry.sections() {
            return Err(DecError::SectionOutOfRange {
                section,
                sections: self.geometry.sections(),
            });
        }
        if counters.section(section) == self.geometry.counter_max() {
            return Err(DecError::KeyExhausted { section });
        }
        Ok(())
    }

    fn encrypt_volume(&self, data: &mut [u8], counters: &mut CounterState) -> DecResult<()> {
        let g = &self.geometry;
        debug!(
            cipher = %g.variant(),
            sections = g.sections(),
            sectors_per_section = g.sectors_per_section(),
            sector_len = g.sector_len(),
            "encrypting volume"
        );

        for j in 0..g.sections() {
            let mut section_key = derive_section_key(self.key, j, counters.section(j))?;
            for i in 0..g.sectors_per_section() {
                if counters.sector(j, i) == g.counter_max() {
                    warn!(section = j, sector = i, "sector counter exhausted, rotating section");
                    self.rotate_section(data, counters, j, 0..i)?;
                    section_key = derive_section_key(self.key, j, counters.section(j))?;
                }
                let counter = counters.increment_sector(j, i);
                self.apply_sector(data, &section_key, j, i, counter)?;
            }
        }
        Ok(())
    }

    fn decrypt_volume(&self, data: &mut [u8], counters: &CounterState) -> DecResult<()> {
        let g = &self.geometry;
        debug!(
            cipher = %g.variant(),
            sections = g.sections(),
            sectors_per_section = g.sectors_per_section(),
            sector_len = g.sector_len(),
            "decrypting volume"
        );

        for j in 0..g.sections() {
            let section_key = derive_section_key(self.key, j, counters.section(j))?;
            for i in 0..g.sectors_per_section() {
                self.apply_sector(data, &section_key, j, i, counters.sector(j, i))?;
            }
        }
        Ok(())
    }

    fn apply_sector(
        &self,
        data: &mut [u8],
        section_key: &SectionKey,
        section: u64,
        sector: u64,
        counter: u64,
    ) -> DecResult<()> {
        let g = &self.geometry;
        trace!(section, sector, counter, "sector");
        let sector_key =
            derive_sector_key(section_key, section, sector, counter, g.rekey_frequency())?;
        let keystream = SectorKeystream::new(&sector_key, sector)?;
        keystream.apply(&mut data[g.sector_range(section, sector)], g, counter)
    }

    /// Advance section `section` to its next epoch.
    ///
    /// Sectors in `rewrite` hold ciphertext under their current counters and
    /// are transformed to the new epoch at counter zero. Every sector counter
    /// of the section is reset.
    fn rotate_section(
        &self,
        data: &mut [u8],
        counters: &mut CounterState,
        section: u64,
        rewrite: Range<u64>,
    ) -> DecResult<()> {
        let g = &self.geometry;
        let epoch = counters.section(section);
        if epoch == g.counter_max() {
            return Err(DecError::KeyExhausted { section });
        }

        let old_key = derive_section_key(self.key, section, epoch)?;
        let new_key = derive_section_key(self.key, section, epoch + 1)?;
        let v = g.rekey_frequency();

        for i in 0..g.sectors_per_section() {
            if !rewrite.contains(&i) {
                counters.reset_sector(section, i);
                continue;
            }
            let old_counter = counters.sector(section, i);
            let old_sector = derive_sector_key(&old_key, section, i, old_counter, v)?;
            counters.reset_sector(section, i);
            let new_sector = derive_sector_key(&new_key, section, i, 0, v)?;

            trace!(section, sector = i, old_counter, "rotating sector");
            let bytes = &mut data[g.sector_range(section, i)];
            SectorKeystream::new(&old_sector, i)?.apply(bytes, g, old_counter)?;
            SectorKeystream::new(&new_sector, i)?.apply(bytes, g, 0)?;
        }

        counters.increment_section(section);
        info!(
            section,
            epoch = epoch + 1,
            rewritten = rewrite.end - rewrite.start,
            "section rotated"
        );
        Ok(())
    }
}

fn require_buffer(what: &'static str, buf: &[u8]) -> DecResult<()> {
    if buf.is_empty() {
        return Err(DecError::NullBuffer(what));
    }
    Ok(())
}

fn require_buffers(input: &[u8], output: &[u8]) -> DecResult<()> {
    require_buffer("input", input)?;
    require_buffer("output", output)
}

/// Encrypt a whole volume; see [`DecMode::encrypt`].
pub fn encrypt(
    key: &BlockCipherKey,
    input: &[u8],
    output: &mut [u8],
    params: &OperationParameters,
    counters: &mut CounterState,
) -> DecResult<()> {
    require_buffers(input, output)?;
    DecMode::new(key, params)?.encrypt(input, output, counters)
}

/// Decrypt a whole volume; see [`DecMode::decrypt`].
pub fn decrypt(
    key: &BlockCipherKey,
    input: &[u8],
    output: &mut [u8],
    params: &OperationParameters,
    counters: &CounterState,
) -> DecResult<()> {
    require_buffers(input, output)?;
    DecMode::new(key, params)?.decrypt(input, output, counters)
}

/// Rotate one section of a ciphertext; see [`DecMode::reencrypt_section`].
pub fn reencrypt_section(
    key: &BlockCipherKey,
    input: &[u8],
    output: &mut [u8],
    params: &OperationParameters,
    counters: &mut CounterState,
    section: u64,
) -> DecResult<()> {
    require_buffers(input, output)?;
    DecMode::new(key, params)?.reencrypt_section(input, output, counters, section)
}
