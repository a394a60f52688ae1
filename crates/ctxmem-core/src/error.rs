//! Error types for ctxmem-core.

use thiserror::Error;

/// Result type alias using ctxmem-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for collaborator operations
#[derive(Error, Debug)]
pub enum Error {
    // Keyed store errors
    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Store(String),

    // Semantic store errors
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    // HTTP errors
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    // Completion errors
    #[error("Completion returned no choices")]
    EmptyCompletion,

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a non-success API response
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Check if this error is a "collection not found" response
    pub fn is_collection_not_found(&self) -> bool {
        matches!(self, Self::CollectionNotFound(_))
    }

    /// Check if this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(feature = "client")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            let endpoint = err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            Self::Timeout { endpoint }
        } else {
            Self::Http(err.to_string())
        }
    }
}
