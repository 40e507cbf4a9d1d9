use thiserror::Error;

pub type DecResult<T> = Result<T, DecError>;

#[derive(Debug, Error)]
pub enum DecError {
    #[error("invalid block width: {0} bytes (supported: 8, 16)")]
    InvalidBlockWidth(usize),

    #[error("missing {0} buffer")]
    NullBuffer(&'static str),

    #[error("{what} length mismatch: expected {expected}, got {actual}")]
    BufferLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid sector length: {len} bytes is not a positive multiple of the {block}-byte block")]
    InvalidSectorLength { len: u64, block: usize },

    #[error("invalid partitioning: {what} = {value} does not divide the counter range {range}")]
    InvalidPartitioning {
        what: &'static str,
        value: u64,
        range: u64,
    },

    #[error("invalid rekey frequency: v = {v} with q = {q} exceeds the counter range {range}")]
    InvalidRekeyFrequency { v: u64, q: u64, range: u64 },

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("counter state is sized for {actual}-bit counters, key requires {expected}-bit")]
    CounterWidthMismatch { expected: u32, actual: u32 },

    #[error("{what} counter {index} = {value} exceeds the {bits}-bit counter width")]
    CounterOutOfRange {
        what: &'static str,
        index: usize,
        value: u64,
        bits: u32,
    },

    #[error("section {section} out of range (volume has {sections} sections)")]
    SectionOutOfRange { section: u64, sections: u64 },

    #[error("section {section} key exhausted: master key can issue no further epochs")]
    KeyExhausted { section: u64 },

    #[error("block cipher initialisation failed: {0}")]
    CipherInitFailure(String),

    #[error("KDF extraction bound exceeded: {requested} bytes requested, {bound} allowed")]
    KdfBoundExceeded { requested: usize, bound: usize },

    #[error("self-test failed: {0}")]
    SelfTestFailed(&'static str),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecError {
    /// Structural errors the caller must fix; retrying with the same inputs cannot succeed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DecError::InvalidBlockWidth(_)
                | DecError::NullBuffer(_)
                | DecError::BufferLength { .. }
                | DecError::InvalidSectorLength { .. }
                | DecError::InvalidPartitioning { .. }
                | DecError::InvalidRekeyFrequency { .. }
                | DecError::InvalidKeyLength { .. }
                | DecError::CounterWidthMismatch { .. }
                | DecError::CounterOutOfRange { .. }
                | DecError::SectionOutOfRange { .. }
        )
    }
}
