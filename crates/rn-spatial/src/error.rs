//! Spatial-subsystem error types.
//!
//! [`SpatialError`] is fatal to engine initialisation.  [`CacheError`] never
//! is: the engine logs it and rebuilds the graph from source.

use thiserror::Error;

use rn_pbf::PbfError;

/// Errors produced while building a network from source.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("map decode error: {0}")]
    Pbf(#[from] PbfError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SpatialResult<T> = Result<T, SpatialError>;

/// Reasons a graph cache file was rejected.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache version {found} does not match expected {expected}")]
    VersionMismatch { found: i32, expected: i32 },

    #[error("cache file truncated")]
    Truncated,

    #[error("cache file has trailing bytes")]
    TrailingBytes,

    #[error("cache file corrupt: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;
