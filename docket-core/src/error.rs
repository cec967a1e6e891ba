//! Error types for Docket operations

use crate::FolderPathKey;
use thiserror::Error;

/// Errors from the network collaborators that feed the cache.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection reset, timeout, 5xx. Retried only by the next navigation
    /// or the next stale-triggered fetch.
    #[error("Transient network error during {context}: {reason}")]
    Transient { context: String, reason: String },

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode response: {reason}")]
    Decode { reason: String },
}

impl FetchError {
    pub fn transient(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transient {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Malformed payloads from an inbound channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("Required field missing from {event_type} event: {field}")]
    MissingField { event_type: String, field: String },

    #[error("Unknown event type: {event_type}")]
    UnknownType { event_type: String },

    #[error("Path {path} cannot be mapped onto the folder tree")]
    InvalidPath { path: String },

    #[error("Malformed payload: {reason}")]
    Malformed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Engine-level failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine state lock poisoned")]
    LockPoisoned,

    #[error("Fetch for folder {folder} failed: {source}")]
    Fetch {
        folder: FolderPathKey,
        #[source]
        source: FetchError,
    },
}

/// Master error type for all Docket errors.
#[derive(Debug, Clone, Error)]
pub enum DocketError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Result type alias for Docket operations.
pub type DocketResult<T> = Result<T, DocketError>;

// =============================================================================
// TESTS
// =============================================================================
