//! Staleness marks for cached folders.

use crate::expiring::ExpiringKeySet;
use docket_core::FolderPathKey;
use std::collections::HashMap;
use std::time::Duration;

/// Folders whose cached listing must not be trusted on the next visit.
///
/// A mark forces exactly one cache bypass: [`InvalidationRegistry::is_stale`]
/// clears it. Marks that are never consumed expire on their own.
#[derive(Debug, Clone)]
pub struct InvalidationRegistry {
    marks: ExpiringKeySet<FolderPathKey>,
    /// Number of marks ever placed per folder.
    epochs: HashMap<FolderPathKey, u64>,
    ttl: Duration,
}

impl InvalidationRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            marks: ExpiringKeySet::new(),
            epochs: HashMap::new(),
            ttl,
        }
    }

    pub fn mark_stale(&mut self, folder: &FolderPathKey) {
        self.mark_stale_for(folder, self.ttl);
    }

    pub fn mark_stale_for(&mut self, folder: &FolderPathKey, ttl: Duration) {
        tracing::debug!(folder = %folder, "Marking folder stale");
        self.marks.add(folder.clone(), ttl);
        let epoch = self.epochs.entry(folder.clone()).or_insert(0);
        *epoch = epoch.wrapping_add(1);
    }

    /// Changes whenever `folder` is marked, even if the mark was already set.
    pub fn epoch(&self, folder: &FolderPathKey) -> u64 {
        self.epochs.get(folder).copied().unwrap_or(0)
    }

    /// Check-and-clear. Returns true at most once per mark.
    pub fn is_stale(&mut self, folder: &FolderPathKey) -> bool {
        self.marks.take(folder)
    }

    /// Observe a mark without consuming it.
    pub fn peek(&self, folder: &FolderPathKey) -> bool {
        self.marks.has(folder)
    }

    pub fn clear(&mut self, folder: &FolderPathKey) {
        self.marks.remove(folder);
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}
