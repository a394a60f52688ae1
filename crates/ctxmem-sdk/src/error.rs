//! SDK Error Types
//!
//! Defines error types for the ctxmem SDK.

use thiserror::Error;

/// SDK Result type alias
pub type SDKResult<T> = Result<T, SDKError>;

/// SDK errors
#[derive(Debug, Error)]
pub enum SDKError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Collaborator error (keyed store, semantic store, completion endpoint)
    #[error("store error: {0}")]
    Store(#[from] ctxmem_core::Error),

    /// Stored data could not be decoded
    #[error("corrupt data under key {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Completion endpoint returned something unusable
    #[error("completion error: {message}")]
    Completion { message: String },

    /// Invalid operation
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Timeout error
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SDKError {
    /// Create a corrupt-data error for a stored key
    pub fn corrupt(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            key: key.into(),
            source,
        }
    }

    /// Create a completion error
    pub fn completion(message: impl Into<String>) -> Self {
        Self::Completion {
            message: message.into(),
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Check if this error is a timeout error, including collaborator timeouts
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Store(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Check if this error means stored data failed to decode
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
