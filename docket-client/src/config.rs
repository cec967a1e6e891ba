//! Configuration loading for the Docket client.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use docket_core::{ConfigError, EngineConfig, FolderPathKey};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_endpoint: String,
    pub auth: AuthConfig,
    pub request_timeout_ms: u64,
    /// File the sync agent appends JSON lines to. Channel disabled when absent.
    pub signal_file: Option<PathBuf>,
    pub signal_poll_ms: u64,
    pub state_path: PathBuf,
    pub initial_folder: String,
    pub log: LogConfig,
    pub reconnect: ReconnectConfig,
    pub engine: EngineSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub jwt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
    pub jitter_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    pub dedup_ttl_ms: u64,
    pub suppression_ttl_ms: u64,
    pub invalidation_ttl_ms: u64,
    pub upload_window_ms: u64,
    pub add_refetch_delay_ms: u64,
    pub structural_refetch_delay_ms: u64,
    pub root_markers: Vec<String>,
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_dedup_ttl(Duration::from_millis(self.dedup_ttl_ms))
            .with_suppression_ttl(Duration::from_millis(self.suppression_ttl_ms))
            .with_invalidation_ttl(Duration::from_millis(self.invalidation_ttl_ms))
            .with_upload_window(Duration::from_millis(self.upload_window_ms))
            .with_add_refetch_delay(Duration::from_millis(self.add_refetch_delay_ms))
            .with_structural_refetch_delay(Duration::from_millis(
                self.structural_refetch_delay_ms,
            ))
            .with_root_markers(self.root_markers.iter().cloned())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientConfigError {
    #[error("Missing configuration file path (use --config or DOCKET_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Invalid engine config: {0}")]
    Engine(#[from] ConfigError),
}

impl ClientConfig {
    pub fn load() -> Result<Self, ClientConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ClientConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ClientConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ClientConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.engine.to_engine_config()
    }

    pub fn initial_folder_key(&self) -> FolderPathKey {
        self.engine_config().normalizer().normalize_folder(&self.initial_folder)
    }

    pub fn validate(&self) -> Result<(), ClientConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ClientConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.ws_endpoint.starts_with("ws://") && !self.ws_endpoint.starts_with("wss://") {
            return Err(ClientConfigError::InvalidValue {
                field: "ws_endpoint",
                reason: "must be a ws:// or wss:// URL".to_string(),
            });
        }
        if self.auth.api_key.is_none() && self.auth.jwt.is_none() {
            return Err(ClientConfigError::InvalidValue {
                field: "auth",
                reason: "api_key or jwt must be provided".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ClientConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.signal_file.is_some() && self.signal_poll_ms == 0 {
            return Err(ClientConfigError::InvalidValue {
                field: "signal_poll_ms",
                reason: "must be > 0 when signal_file is set".to_string(),
            });
        }
        if self.state_path.as_os_str().is_empty() {
            return Err(ClientConfigError::InvalidValue {
                field: "state_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.log.filter.trim().is_empty() {
            return Err(ClientConfigError::InvalidValue {
                field: "log.filter",
                reason: "must not be empty".to_string(),
            });
        }
        if self.reconnect.initial_ms == 0 {
            return Err(ClientConfigError::InvalidValue {
                field: "reconnect.initial_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.reconnect.max_ms < self.reconnect.initial_ms {
            return Err(ClientConfigError::InvalidValue {
                field: "reconnect.max_ms",
                reason: "must be >= initial_ms".to_string(),
            });
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(ClientConfigError::InvalidValue {
                field: "reconnect.multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        self.engine_config().validate()?;
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("DOCKET_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
