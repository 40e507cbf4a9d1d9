//! Block cipher adapters: Magma (64-bit block) and Kuznyechik (128-bit block)
//!
//! Both ciphers take a 256-bit key. The construction only ever runs the
//! forward direction, so only `BlockEncrypt` is wired up.

use cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use decvol_core::{CipherVariant, DecError, DecResult};
use kuznyechik::Kuznyechik;
use magma::Magma;

/// Width of the widest supported block
pub const MAX_BLOCK_SIZE: usize = 16;

/// One cipher block, sized for its variant.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Block {
    bytes: [u8; MAX_BLOCK_SIZE],
    len: usize,
}

impl Block {
    pub fn zeroed(variant: CipherVariant) -> Self {
        Self {
            bytes: [0u8; MAX_BLOCK_SIZE],
            len: variant.block_width(),
        }
    }

    /// Build a block from 8 or 16 bytes.
    pub(crate) fn from_slice(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() == 8 || bytes.len() == MAX_BLOCK_SIZE);
        let mut block = Self {
            bytes: [0u8; MAX_BLOCK_SIZE],
            len: bytes.len(),
        };
        block.bytes[..bytes.len()].copy_from_slice(bytes);
        block
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("len", &self.len)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A block cipher keyed for one sector (or one KDF step).
pub enum KeyedCipher {
    Narrow(Magma),
    Wide(Kuznyechik),
}

impl KeyedCipher {
    pub fn new(variant: CipherVariant, key: &[u8]) -> DecResult<Self> {
        match variant {
            CipherVariant::Narrow => Magma::new_from_slice(key)
                .map(KeyedCipher::Narrow)
                .map_err(|e| DecError::CipherInitFailure(format!("magma: {e}"))),
            CipherVariant::Wide => Kuznyechik::new_from_slice(key)
                .map(KeyedCipher::Wide)
                .map_err(|e| DecError::CipherInitFailure(format!("kuznyechik: {e}"))),
        }
    }

    pub fn variant(&self) -> CipherVariant {
        match self {
            KeyedCipher::Narrow(_) => CipherVariant::Narrow,
            KeyedCipher::Wide(_) => CipherVariant::Wide,
        }
    }

    /// Encrypt a single block. The input must be sized for this cipher's variant.
    pub fn encrypt(&self, input: &Block) -> Block {
        debug_assert_eq!(input.len(), self.variant().block_width());
        let mut out = *input;
        match self {
            KeyedCipher::Narrow(c) => {
                c.encrypt_block(GenericArray::from_mut_slice(out.as_mut_bytes()))
            }
            KeyedCipher::Wide(c) => {
                c.encrypt_block(GenericArray::from_mut_slice(out.as_mut_bytes()))
            }
        }
        out
    }
}

impl std::fmt::Debug for KeyedCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("KeyedCipher").field(&self.variant()).finish()
    }
}
