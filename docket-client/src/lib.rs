//! Docket client library exports.
//!
//! Channel adapters around the cache engine: the REST client that feeds it,
//! the push socket and signal-file watchers that report remote changes, and
//! the local action layer that reports confirmed user changes.

pub mod actions;
pub mod adapters;
pub mod api_client;
pub mod config;
pub mod error;
pub mod events;
pub mod persistence;
pub mod pump;
pub mod realtime;
pub mod signals;
pub mod telemetry;

pub use actions::{DocumentMutations, LocalActions};
pub use adapters::EventAdapter;
pub use api_client::{ApiClient, ApiClientError, RestClient, WsClient};
pub use config::{ClientConfig, ClientConfigError};
pub use error::{ClientError, ClientResult};
pub use events::{ClientEvent, PushEvent};
pub use pump::EventPump;
