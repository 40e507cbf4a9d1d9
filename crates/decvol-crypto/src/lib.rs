//! decvol-crypto: sectioned counter-mode encryption for fixed-layout volumes
//!
//! A volume is `w` sections of `s` sectors of `l` bytes. Each section owns a
//! key epoch that can be rotated in place; each sector rekeys itself every
//! `v` encryptions.
//!
//! Key hierarchy:
//! ```text
//! Master Key (256-bit, Magma or Kuznyechik)
//!   └── Section Key  (CMAC KDF, label = {section counter, j}, context = 0)
//!       └── Sector Key  (CMAC KDF, label = {sector counter / v, i}, context = {j, 0})
//!           └── Keystream block: E_sector( {i, sector counter * q + t} )
//! ```

pub mod cipher;
pub mod counters;
pub mod kdf;
pub mod keys;
pub mod keystream;
pub mod label;
pub mod mode;
pub mod selftest;

pub use cipher::{Block, KeyedCipher};
pub use counters::CounterState;
pub use kdf::{KdfState, KDF_EXTRACTION_BOUND};
pub use keys::{derive_section_key, derive_sector_key, BlockCipherKey, SectionKey, SectorKey};
pub use keystream::{keystream_block, SectorKeystream};
pub use label::PackedBlock;
pub use mode::{decrypt, encrypt, reencrypt_section, DecMode};

/// Size of every key in the hierarchy in bytes (256-bit)
pub const KEY_SIZE: usize = 32;
