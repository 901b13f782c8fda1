//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Main error type for Cadence
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CadenceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Sync already in progress for calendar {0}")]
    SyncInProgress(Uuid),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CadenceError {
    /// True for failures that a later retry may not reproduce.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Database(_) | Self::SyncInProgress(_))
    }
}

/// Result type alias for Cadence operations
pub type Result<T> = std::result::Result<T, CadenceError>;

/// Failure of a single provider API call, classified for retry and refresh
/// decisions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// 401; the caller refreshes the token and retries once.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The stored sync token was rejected (Google 410, Graph `syncStateNotFound`).
    #[error("Sync token expired")]
    SyncTokenExpired,

    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Client error {status}: {message}")]
    Client { status: u16, message: String },

    /// Response body could not be decoded or mapped.
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Eligible for the adapter's backoff retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Timeout | Self::Network(_)
        )
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Classify an HTTP status code with its response body.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            410 => Self::SyncTokenExpired,
            429 => Self::RateLimited { retry_after_secs: None },
            500..=599 => Self::Server { status, message },
            _ => Self::Client { status, message },
        }
    }
}

impl From<ProviderError> for CadenceError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unauthorized(msg) => Self::Auth(msg),
            ProviderError::NotFound(msg) => Self::NotFound(msg),
            ProviderError::Timeout | ProviderError::Network(_) => Self::Network(err.to_string()),
            other => Self::Provider(other.to_string()),
        }
    }
}
