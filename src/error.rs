//! Error types.
//!
//! Map operations never fail: absence and expiry are reported through
//! `Option` and `bool` results. Errors only arise while setting a map up.

use thiserror::Error;

/// Problems with a sweep configuration.
///
/// Constructors never reject a configuration; they fall back to defaults
/// and log the error as a warning instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The delete scale is outside `(0, 1]`
    #[error("delete scale must be in (0, 1], got {0}")]
    InvalidDeleteScale(f64),

    /// The sweep interval is zero
    #[error("sweep interval must be greater than zero")]
    ZeroInterval,
}

/// Errors returned by the fallible `AgingMap` constructors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Active eviction was requested outside a Tokio runtime
    #[error("active eviction needs a running Tokio runtime")]
    NoRuntime,
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;
