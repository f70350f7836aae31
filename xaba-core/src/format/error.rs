use thiserror::Error;

use super::store::PayloadKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {structure} signature: expected {expected:?}, found {found:02X?}")]
    InvalidSignature {
        structure: &'static str,
        expected: &'static str,
        found: Vec<u8>,
    },

    #[error("truncated {structure}: need {needed} bytes, have {available}")]
    TruncatedInput {
        structure: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("decompression failed (declared size {declared}): {reason}")]
    Decompression { declared: u32, reason: String },

    #[error("descriptor index out of range: idx={index}, descriptor_count={count}")]
    DescriptorOutOfRange { index: u32, count: usize },

    #[error(
        "{kind} payload out of bounds: offset=0x{offset:X} size=0x{size:X}, \
         data_start=0x{data_start:X} data_len=0x{data_len:X}"
    )]
    PayloadOutOfBounds {
        kind: PayloadKind,
        offset: u32,
        size: u32,
        data_start: usize,
        data_len: usize,
    },

    #[error("no store with id 0 (the store carrying the hash tables)")]
    MissingIndexStore,

    #[error("store id {store_id} appears more than once")]
    DuplicateStoreId { store_id: u32 },

    #[error("hash entry references unknown store id {store_id}")]
    UnknownStore { store_id: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Signature mismatches are the one error the extractor recovers from.
    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, Error::InvalidSignature { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
