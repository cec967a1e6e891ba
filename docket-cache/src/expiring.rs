//! TTL-bounded membership set.
//!
//! One timer-free utility shared by the deduplicator, the suppression
//! registry and the invalidation registry. Entries carry their own deadline
//! and are purged lazily, so expiry only has to happen "eventually".

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Set of keys that disappear after a per-key time-to-live.
///
/// Uses the tokio clock, so tests can pause and advance time.
#[derive(Debug, Clone)]
pub struct ExpiringKeySet<K> {
    entries: HashMap<K, Instant>,
}

impl<K> ExpiringKeySet<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register `key` for `ttl`, extending the deadline if already present.
    pub fn add(&mut self, key: K, ttl: Duration) {
        let now = Instant::now();
        self.purge_at(now);
        if ttl.is_zero() {
            return;
        }
        self.entries.insert(key, now + ttl);
    }

    /// Register `key` unless it is already live. Returns true when added.
    pub fn insert_if_absent(&mut self, key: K, ttl: Duration) -> bool {
        if self.has(&key) {
            return false;
        }
        self.add(key, ttl);
        true
    }

    /// Whether `key` is present and unexpired.
    pub fn has(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .is_some_and(|deadline| *deadline > Instant::now())
    }

    /// Check-and-clear: returns true at most once per registration.
    pub fn take(&mut self, key: &K) -> bool {
        match self.entries.remove(key) {
            Some(deadline) => deadline > Instant::now(),
            None => false,
        }
    }

    pub fn remove(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// Time left before `key` expires.
    pub fn remaining(&self, key: &K) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|deadline| **deadline > now)
            .map(|deadline| *deadline - now)
    }

    /// Drop every expired key. Returns how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        self.purge_at(Instant::now())
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.values().filter(|d| **d > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn purge_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, deadline| *deadline > now);
        before - self.entries.len()
    }
}

impl<K> Default for ExpiringKeySet<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_key_expires_after_ttl() {
        let mut set = ExpiringKeySet::new();
        set.add("a", Duration::from_millis(100));
        assert!(set.has(&"a"));

        tokio::time::advance(Duration::from_millis(99)).await;
        assert!(set.has(&"a"));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(!set.has(&"a"));
        assert_eq!(set.purge_expired(), 1);
        assert!(set.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_if_absent() {
        let mut set = ExpiringKeySet::new();
        assert!(set.insert_if_absent(1u32, Duration::from_secs(1)));
        assert!(!set.insert_if_absent(1u32, Duration::from_secs(1)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(set.insert_if_absent(1u32, Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_is_check_and_clear() {
        let mut set = ExpiringKeySet::new();
        set.add("k", Duration::from_secs(5));
        assert!(set.take(&"k"));
        assert!(!set.take(&"k"));

        set.add("k", Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!set.take(&"k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_extends_deadline() {
        let mut set = ExpiringKeySet::new();
        set.add("k", Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(800)).await;
        set.add("k", Duration::from_secs(1));
        tokio::time::advance(Duration::from_millis(800)).await;
        assert!(set.has(&"k"));
        assert_eq!(set.remaining(&"k"), Some(Duration::from_millis(200)));
    }

    #[test]
    fn test_zero_ttl_is_never_stored() {
        let mut set = ExpiringKeySet::new();
        set.add("k", Duration::ZERO);
        assert!(!set.has(&"k"));
        assert_eq!(set.len(), 0);
    }
}
