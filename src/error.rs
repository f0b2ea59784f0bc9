//! Error types for the object store
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::crypto::CryptoError;

// == Store Error Enum ==
/// Unified error type for store and cache operations.
///
/// Not-found is never an error: absent values come back as `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Key rejected before any I/O (empty, path separator, reserved prefix)
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Child store name rejected before any I/O
    #[error("Invalid child store name: {0}")]
    InvalidName(String),

    /// Bad watermarks, key material or environment values
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backing store I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be serialized on the write path
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// A value could not be encrypted on the write path
    #[error("Encryption failed: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the object store.
pub type Result<T> = std::result::Result<T, StoreError>;
