//! Duplicate-delivery rejection.
//!
//! The same logical change routinely arrives twice: once over the push socket
//! and once through the signal file, or once from the local action and once
//! as its echo. The deduplicator remembers each processed
//! [`MutationEventKey`] for a short window.

use crate::expiring::ExpiringKeySet;
use docket_core::{document_path, normalize_name, FolderPathKey, MutationEventKey};
use std::time::Duration;

/// Remembers recently processed events, moves and announced uploads.
#[derive(Debug, Clone)]
pub struct EventDeduplicator {
    processed: ExpiringKeySet<MutationEventKey>,
    moved_names: ExpiringKeySet<String>,
    uploads: ExpiringKeySet<String>,
    ttl: Duration,
    upload_window: Duration,
}

impl EventDeduplicator {
    pub fn new(ttl: Duration, upload_window: Duration) -> Self {
        Self {
            processed: ExpiringKeySet::new(),
            moved_names: ExpiringKeySet::new(),
            uploads: ExpiringKeySet::new(),
            ttl,
            upload_window,
        }
    }

    /// Returns false when `key` was already processed within the window.
    /// Otherwise registers it and returns true.
    pub fn should_process(&mut self, key: &MutationEventKey) -> bool {
        let fresh = self.processed.insert_if_absent(key.clone(), self.ttl);
        if !fresh {
            tracing::debug!(key = %key, "Duplicate mutation event");
        }
        fresh
    }

    /// Register `key` without checking it, restarting its window.
    pub fn record(&mut self, key: MutationEventKey) {
        self.processed.add(key, self.ttl);
    }

    /// Remember that a document with this name was just moved.
    pub fn note_move(&mut self, name: &str) {
        self.moved_names.add(normalize_name(name), self.ttl);
    }

    /// Whether a document with this name was moved within the window.
    pub fn recently_moved(&self, name: &str) -> bool {
        self.moved_names.has(&normalize_name(name))
    }

    /// Remember that the user started an upload of `name` into `folder`.
    pub fn note_upload(&mut self, folder: &FolderPathKey, name: &str) {
        self.uploads.add(document_path(folder, name), self.upload_window);
    }

    pub fn is_expected_upload(&self, folder: &FolderPathKey, name: &str) -> bool {
        self.uploads.has(&document_path(folder, name))
    }

    /// Number of event keys currently remembered.
    pub fn tracked(&self) -> usize {
        self.processed.len()
    }
}
