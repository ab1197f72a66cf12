//! Error types for kvsstore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using KvsError
pub type Result<T> = std::result::Result<T, KvsError>;

/// Unified error type for kvsstore operations
#[derive(Debug, Error)]
pub enum KvsError {
    // -------------------------------------------------------------------------
    // Key Errors
    // -------------------------------------------------------------------------
    #[error("Key too long: {len} bytes (max {max})", max = crate::key::MAX_KEY_SIZE)]
    KeyTooLong { len: usize },

    #[error("Escape decode error: {0}")]
    Escape(String),

    #[error("Key class mismatch: expected {expected}, found discriminator {found:#x}")]
    KeyClassMismatch { expected: &'static str, found: u32 },

    #[error("Malformed key: {0}")]
    MalformedKey(String),

    // -------------------------------------------------------------------------
    // Page Errors
    // -------------------------------------------------------------------------
    #[error("Page load failed at offset {offset}: {reason}")]
    Load { offset: u64, reason: String },

    #[error("Page remove failed at offset {offset}: {reason}")]
    Remove { offset: u64, reason: String },

    #[error("Invalid byte range: offset {offset}, length {len}")]
    InvalidRange { offset: u64, len: u64 },

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Object too large: offset {offset} beyond addressable limit {limit}")]
    ObjectTooLarge { offset: u64, limit: u64 },

    #[error("Data corruption detected: {0}")]
    Corruption(String),

    #[error("Medium error: {0}")]
    Medium(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for KvsError {
    fn from(e: bincode::Error) -> Self {
        KvsError::Serialization(e.to_string())
    }
}
