//! Error types for the client.

use crate::api_client::ApiClientError;
use crate::config::ClientConfigError;
use crate::persistence::PersistenceError;
use docket_core::{EngineError, EventError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ClientConfigError),
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error("Telemetry init failed: {0}")]
    Telemetry(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
