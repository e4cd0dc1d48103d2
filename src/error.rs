//! Error types for the key server
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using KeyServerError
pub type Result<T> = std::result::Result<T, KeyServerError>;

/// Unified error type for key server operations
#[derive(Debug, Error)]
pub enum KeyServerError {
    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key server half not found")]
    NotFound,

    #[error("Expected length {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Encoding error: {0}")]
    Encoding(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Failed to open storage: {0}")]
    StorageOpen(String),

    #[error("Storage IO error: {0}")]
    StorageIo(#[from] std::io::Error),

    #[error("Log corruption detected: {0}")]
    LogCorruption(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Network error: {0}")]
    Network(#[source] std::io::Error),

    #[error("Remote error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KeyServerError {
    /// Build a `LengthMismatch` for a buffer that should have been `expected` bytes
    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        Self::LengthMismatch { expected, actual }
    }

    /// True if the error means "nothing stored under this identifier"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// True if the peer closed or reset the connection
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Network(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

impl From<bincode::Error> for KeyServerError {
    fn from(err: bincode::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}
