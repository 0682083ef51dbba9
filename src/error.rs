//! Error types for rawkv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using RawKvError
pub type Result<T> = std::result::Result<T, RawKvError>;

/// Unified error type for rawkv operations
#[derive(Debug, Error)]
pub enum RawKvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage is not started")]
    NotStarted,

    #[error("Transaction already committed or discarded")]
    TxnClosed,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for RawKvError {
    fn from(e: bincode::Error) -> Self {
        RawKvError::Serialization(e.to_string())
    }
}

impl RawKvError {
    /// True when the error only reports that a key is absent
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, RawKvError::KeyNotFound)
    }
}
