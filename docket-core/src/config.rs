//! Configuration types

use crate::error::ConfigError;
use crate::path::{PathNormalizer, DEFAULT_ROOT_MARKER};
use std::time::Duration;

/// Tuning knobs for the cache engine.
///
/// The defaults match the windows the sync agent and the push socket are
/// known to produce echoes in.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// How long a processed mutation key rejects repeat deliveries.
    pub dedup_ttl: Duration,
    /// How long a locally confirmed path ignores external echoes.
    pub suppression_ttl: Duration,
    /// How long a staleness mark survives if the folder is never entered.
    pub invalidation_ttl: Duration,
    /// How long a locally announced upload keeps its add event from being
    /// treated as a move echo.
    pub upload_window: Duration,
    /// Delay before the forced refetch that replaces an add placeholder.
    pub add_refetch_delay: Duration,
    /// Delay before refetching after a folder create/remove/move.
    pub structural_refetch_delay: Duration,
    /// Path segments that mark the root of the document tree in absolute
    /// filesystem paths.
    pub root_markers: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedup_ttl: Duration::from_millis(3_000),
            suppression_ttl: Duration::from_millis(2_000),
            invalidation_ttl: Duration::from_millis(5_000),
            upload_window: Duration::from_millis(10_000),
            add_refetch_delay: Duration::from_millis(750),
            structural_refetch_delay: Duration::ZERO,
            root_markers: vec![DEFAULT_ROOT_MARKER.to_string()],
        }
    }
}

impl EngineConfig {
    /// Create a new engine config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup_ttl(mut self, ttl: Duration) -> Self {
        self.dedup_ttl = ttl;
        self
    }

    pub fn with_suppression_ttl(mut self, ttl: Duration) -> Self {
        self.suppression_ttl = ttl;
        self
    }

    pub fn with_invalidation_ttl(mut self, ttl: Duration) -> Self {
        self.invalidation_ttl = ttl;
        self
    }

    pub fn with_upload_window(mut self, window: Duration) -> Self {
        self.upload_window = window;
        self
    }

    pub fn with_add_refetch_delay(mut self, delay: Duration) -> Self {
        self.add_refetch_delay = delay;
        self
    }

    pub fn with_structural_refetch_delay(mut self, delay: Duration) -> Self {
        self.structural_refetch_delay = delay;
        self
    }

    pub fn with_root_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.root_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Build the path normalizer for the configured root markers.
    pub fn normalizer(&self) -> PathNormalizer {
        PathNormalizer::new(&self.root_markers)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ttls = [
            ("dedup_ttl", self.dedup_ttl),
            ("suppression_ttl", self.suppression_ttl),
            ("invalidation_ttl", self.invalidation_ttl),
        ];
        for (field, ttl) in ttls {
            if ttl.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: format!("{:?}", ttl),
                    reason: "must be > 0".to_string(),
                });
            }
        }
        if self.root_markers.iter().all(|m| m.trim_matches('/').trim().is_empty()) {
            return Err(ConfigError::MissingRequired {
                field: "root_markers".to_string(),
            });
        }
        Ok(())
    }
}
