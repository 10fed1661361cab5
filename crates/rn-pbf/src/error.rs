//! Decode error type.

use thiserror::Error;

use crate::wire::WireType;

/// Errors produced while decoding a map extract.
#[derive(Debug, Error)]
pub enum PbfError {
    #[error("unexpected end of data while reading {what}")]
    Truncated { what: &'static str },

    #[error("unsupported wire type {0}")]
    UnsupportedWireType(u8),

    #[error("field {field}: expected {expected:?} wire type, found {found:?}")]
    UnexpectedWireType {
        field:    u32,
        expected: WireType,
        found:    WireType,
    },

    #[error("length {len} at offset {pos} exceeds buffer limit {limit}")]
    InvalidLength { len: u64, pos: usize, limit: usize },

    #[error("varint longer than 10 bytes")]
    VarintTooLong,

    #[error("invalid block header: {0}")]
    InvalidHeader(&'static str),

    #[error("blob carries neither raw nor zlib data")]
    UnsupportedBlobEncoding,

    #[error("inflated blob exceeds {limit} bytes")]
    BlobTooLarge { limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PbfResult<T> = Result<T, PbfError>;
