//! Core error type.
//!
//! Sub-crates define their own error enums (`PbfError`, `SpatialError`,
//! `CacheError`); this one covers configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for `rn-core`.
pub type CoreResult<T> = Result<T, CoreError>;
