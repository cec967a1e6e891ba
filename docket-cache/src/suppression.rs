//! Echo suppression for locally confirmed mutations.

use crate::expiring::ExpiringKeySet;
use docket_core::SuppressionKey;
use std::time::Duration;

/// Paths whose external events are ignored for a short window.
///
/// Registered right after a local REST call succeeds, before the server's
/// broadcast of the same change can arrive.
#[derive(Debug, Clone)]
pub struct SuppressionRegistry {
    keys: ExpiringKeySet<SuppressionKey>,
    ttl: Duration,
}

impl SuppressionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            keys: ExpiringKeySet::new(),
            ttl,
        }
    }

    /// Suppress `key` for the default window.
    pub fn suppress(&mut self, key: SuppressionKey) {
        self.suppress_for(key, self.ttl);
    }

    pub fn suppress_for(&mut self, key: SuppressionKey, ttl: Duration) {
        tracing::debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "Suppressing echoes");
        self.keys.add(key, ttl);
    }

    pub fn is_suppressed(&self, key: &SuppressionKey) -> bool {
        self.keys.has(key)
    }

    /// True when any of the candidate keys is suppressed.
    pub fn any_suppressed<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a SuppressionKey>,
    {
        keys.into_iter().any(|key| self.keys.has(key))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
