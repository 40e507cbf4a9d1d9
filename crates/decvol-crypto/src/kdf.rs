//! Key derivation chain: CMAC-based extract-then-expand over the volume's block cipher
//!
//! ```text
//! extract: K* = K xor ( CMAC_K(0x01 || seed) || CMAC_K(0x02 || seed) || ... )
//! expand:  chunk = CMAC_K*(BE32(c) || label || 0x00 || context || BE32(chunk_bits)),  c = 1, 2, ...
//! ```
//!
//! Every derivation in the key hierarchy reads exactly one 256-bit chunk from a
//! fresh state; the extraction bound only guards against runaway callers.

use cmac::digest::KeyInit;
use cmac::{Cmac, Mac};
use decvol_core::{CipherVariant, DecError, DecResult};
use kuznyechik::Kuznyechik;
use magma::Magma;
use zeroize::Zeroizing;

use crate::cipher::Block;
use crate::label::PackedBlock;
use crate::KEY_SIZE;

/// Maximum bytes of key material one state may release
pub const KDF_EXTRACTION_BOUND: usize = 32768;

/// Fixed extraction seed
pub const KDF_SEED: [u8; 32] = [0u8; 32];

/// One key-derivation state: input key, label, context and extraction accounting.
pub struct KdfState {
    variant: CipherVariant,
    key: Zeroizing<[u8; KEY_SIZE]>,
    label: Vec<u8>,
    context: Vec<u8>,
    chunk_size: usize,
    bound: usize,
    extracted: usize,
    counter: u32,
}

impl KdfState {
    pub fn new(
        variant: CipherVariant,
        input_key: &[u8; KEY_SIZE],
        label: &[u8],
        seed: &[u8],
        context: &[u8],
        chunk_size: usize,
        bound: usize,
    ) -> DecResult<Self> {
        let mut key = Zeroizing::new(*input_key);
        let mut offset = 0;
        let mut round = 1u8;
        while offset < KEY_SIZE {
            let mask = cmac(variant, input_key, &[&[round][..], seed])?;
            let take = mask.len().min(KEY_SIZE - offset);
            for (k, m) in key[offset..offset + take].iter_mut().zip(mask.as_bytes()) {
                *k ^= m;
            }
            offset += take;
            round += 1;
        }

        Ok(Self {
            variant,
            key,
            label: label.to_vec(),
            context: context.to_vec(),
            chunk_size,
            bound,
            extracted: 0,
            counter: 0,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes released so far
    pub fn extracted(&self) -> usize {
        self.extracted
    }

    /// Write the next chunk of key material into `out` (exactly `chunk_size` bytes).
    pub fn next_chunk(&mut self, out: &mut [u8]) -> DecResult<()> {
        if out.len() != self.chunk_size {
            return Err(DecError::BufferLength {
                what: "KDF chunk",
                expected: self.chunk_size,
                actual: out.len(),
            });
        }
        let requested = self.extracted + out.len();
        if requested > self.bound {
            return Err(DecError::KdfBoundExceeded {
                requested,
                bound: self.bound,
            });
        }

        let chunk_bits = ((self.chunk_size * 8) as u32).to_be_bytes();
        let mut filled = 0;
        while filled < out.len() {
            self.counter = self.counter.wrapping_add(1);
            let block = cmac(
                self.variant,
                &self.key[..],
                &[
                    &self.counter.to_be_bytes()[..],
                    self.label.as_slice(),
                    &[0u8][..],
                    self.context.as_slice(),
                    &chunk_bits[..],
                ],
            )?;
            let take = block.len().min(out.len() - filled);
            out[filled..filled + take].copy_from_slice(&block.as_bytes()[..take]);
            filled += take;
        }

        self.extracted = requested;
        Ok(())
    }
}

impl std::fmt::Debug for KdfState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KdfState")
            .field("variant", &self.variant)
            .field("key", &"[REDACTED]")
            .field("chunk_size", &self.chunk_size)
            .field("extracted", &self.extracted)
            .field("bound", &self.bound)
            .finish()
    }
}

/// Derive one 256-bit key from `base` under the given label and context.
pub fn derive(
    variant: CipherVariant,
    base: &[u8; KEY_SIZE],
    label: PackedBlock,
    context: PackedBlock,
) -> DecResult<Zeroizing<[u8; KEY_SIZE]>> {
    let label = label.encode(variant);
    let context = context.encode(variant);
    let mut state = KdfState::new(
        variant,
        base,
        label.as_bytes(),
        &KDF_SEED,
        context.as_bytes(),
        KEY_SIZE,
        KDF_EXTRACTION_BOUND,
    )?;

    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    state.next_chunk(&mut out[..])?;
    Ok(out)
}

fn cmac(variant: CipherVariant, key: &[u8], parts: &[&[u8]]) -> DecResult<Block> {
    match variant {
        CipherVariant::Narrow => cmac_with::<Cmac<Magma>>(key, parts),
        CipherVariant::Wide => cmac_with::<Cmac<Kuznyechik>>(key, parts),
    }
}

fn cmac_with<M: Mac + KeyInit>(key: &[u8], parts: &[&[u8]]) -> DecResult<Block> {
    let mut mac = <M as Mac>::new_from_slice(key)
        .map_err(|e| DecError::CipherInitFailure(format!("CMAC key: {e}")))?;
    for part in parts {
        mac.update(part);
    }
    Ok(Block::from_slice(&mac.finalize().into_bytes()))
}
