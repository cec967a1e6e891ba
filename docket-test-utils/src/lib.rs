//! Docket Test Utilities
//!
//! Centralized test infrastructure for the Docket workspace:
//! - A scriptable in-memory [`DocumentSource`]
//! - Proptest generators for paths, records and events
//! - Fixtures for common folder layouts
//! - Assertions over rendered listings

pub use docket_core::{
    CacheEntry, DocumentId, DocumentRecord, DocumentSource, EngineConfig, EventKind,
    FetchError, FolderChange, FolderNode, FolderPathKey, MutationEvent, OriginChannel, Timestamp,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

// ============================================================================
// MOCK SOURCE
// ============================================================================

#[derive(Default)]
struct MockState {
    listings: HashMap<FolderPathKey, Vec<DocumentRecord>>,
    tree: Vec<FolderNode>,
    gates: HashMap<FolderPathKey, Arc<Notify>>,
    failures: HashMap<FolderPathKey, FetchError>,
    fetch_log: Vec<FolderPathKey>,
}

/// In-memory document server.
///
/// Listings are served from a map. Individual folders can be held until
/// released, which lets tests resolve fetches in any order, or made to fail
/// once.
#[derive(Default)]
pub struct MockSource {
    state: Mutex<MockState>,
    tree_fetches: AtomicUsize,
    thumbnail_refreshes: AtomicUsize,
    thumbnails: Notify,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serve `documents` for `folder` from now on.
    pub fn with_listing(self, folder: &str, documents: Vec<DocumentRecord>) -> Self {
        self.set_listing(folder, documents);
        self
    }

    pub fn set_listing(&self, folder: &str, documents: Vec<DocumentRecord>) {
        self.state()
            .listings
            .insert(FolderPathKey::parse(folder), documents);
    }

    pub fn set_tree(&self, nodes: Vec<FolderNode>) {
        self.state().tree = nodes;
    }

    /// Block fetches of `folder` until [`MockSource::release`] is called.
    pub fn hold(&self, folder: &str) {
        self.state()
            .gates
            .insert(FolderPathKey::parse(folder), Arc::new(Notify::new()));
    }

    /// Let one held fetch of `folder` proceed.
    pub fn release(&self, folder: &str) {
        if let Some(gate) = self.state().gates.remove(&FolderPathKey::parse(folder)) {
            gate.notify_one();
        }
    }

    /// Make the next fetch of `folder` fail with `error`.
    pub fn fail_next(&self, folder: &str, error: FetchError) {
        self.state()
            .failures
            .insert(FolderPathKey::parse(folder), error);
    }

    /// Number of listing fetches for `folder`.
    pub fn fetches_of(&self, folder: &str) -> usize {
        let key = FolderPathKey::parse(folder);
        self.state().fetch_log.iter().filter(|f| **f == key).count()
    }

    /// Total listing fetches.
    pub fn document_fetches(&self) -> usize {
        self.state().fetch_log.len()
    }

    pub fn tree_fetches(&self) -> usize {
        self.tree_fetches.load(Ordering::SeqCst)
    }

    pub fn thumbnail_refreshes(&self) -> usize {
        self.thumbnail_refreshes.load(Ordering::SeqCst)
    }

    /// Resolves after the next thumbnail refresh call.
    pub async fn thumbnails_refreshed(&self) {
        self.thumbnails.notified().await;
    }
}

#[async_trait]
impl DocumentSource for MockSource {
    async fn fetch_folder_tree(&self) -> Result<Vec<FolderNode>, FetchError> {
        self.tree_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.state().tree.clone())
    }

    async fn fetch_documents(
        &self,
        folder: &FolderPathKey,
    ) -> Result<Vec<DocumentRecord>, FetchError> {
        let gate = {
            let mut state = self.state();
            state.fetch_log.push(folder.clone());
            state.gates.get(folder).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.state();
        if let Some(error) = state.failures.remove(folder) {
            return Err(error);
        }
        Ok(state.listings.get(folder).cloned().unwrap_or_default())
    }

    async fn refresh_thumbnails(
        &self,
        _folder: &FolderPathKey,
        _documents: &[DocumentId],
    ) -> Result<(), FetchError> {
        self.thumbnail_refreshes.fetch_add(1, Ordering::SeqCst);
        self.thumbnails.notify_one();
        Ok(())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Docket types.

    use super::*;
    use proptest::prelude::*;

    /// Server-assigned id.
    pub fn arb_document_id() -> impl Strategy<Value = DocumentId> {
        (1i64..1_000_000).prop_map(DocumentId::new)
    }

    /// File name with an extension, in mixed case.
    pub fn arb_document_name() -> impl Strategy<Value = String> {
        ("[a-zA-Z][a-zA-Z0-9_-]{0,11}", prop_oneof!["pdf", "txt", "docx", "PNG"])
            .prop_map(|(stem, ext)| format!("{}.{}", stem, ext))
    }

    /// Folder segment without dots.
    pub fn arb_segment() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9 _-]{0,9}".prop_map(|s| s.trim().to_string())
    }

    /// Logical folder path such as `Org/Team`.
    pub fn arb_folder_path() -> impl Strategy<Value = String> {
        prop::collection::vec(arb_segment(), 1..4).prop_map(|segments| segments.join("/"))
    }

    pub fn arb_folder_key() -> impl Strategy<Value = FolderPathKey> {
        arb_folder_path().prop_map(|path| FolderPathKey::parse(&path))
    }

    /// A folder path rendered the way the sync agent would write it.
    pub fn arb_absolute_path(folder: String) -> impl Strategy<Value = String> {
        prop_oneof![
            Just(format!("/srv/uploads/{}", folder)),
            Just(format!("C:\\data\\Uploads\\{}", folder.replace('/', "\\"))),
            Just(format!("//srv//uploads//{}//", folder)),
            Just(folder.clone()),
            Just(format!("/{}/", folder)),
        ]
    }

    /// Generate a Timestamp (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(chrono::Utc::now)
        })
    }

    /// Fully known record in `folder`.
    pub fn arb_document_record(folder: FolderPathKey) -> impl Strategy<Value = DocumentRecord> {
        (
            arb_document_id(),
            arb_document_name(),
            arb_timestamp(),
            prop_oneof!["pdf", "txt", "image"],
            prop::option::of(0u64..10_000_000),
            prop::collection::vec("[a-z]{2,8}", 0..3),
        )
            .prop_map(move |(id, name, uploaded_at, doc_type, size, tags)| {
                let mut record = DocumentRecord::new(id, name, folder.clone())
                    .with_type(doc_type)
                    .with_uploaded_at(uploaded_at)
                    .with_tags(tags);
                record.size_bytes = size;
                record
            })
    }

    /// Listing with unique names and ids.
    pub fn arb_listing(folder: FolderPathKey) -> impl Strategy<Value = Vec<DocumentRecord>> {
        prop::collection::vec(arb_document_record(folder), 0..8).prop_map(|records| {
            let mut seen_names = std::collections::HashSet::new();
            let mut seen_ids = std::collections::HashSet::new();
            records
                .into_iter()
                .filter(|r| seen_names.insert(r.name.to_lowercase()) && seen_ids.insert(r.id))
                .collect()
        })
    }

    pub fn arb_external_origin() -> impl Strategy<Value = OriginChannel> {
        prop_oneof![Just(OriginChannel::Socket), Just(OriginChannel::Signal)]
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and events.

    use super::*;
    use chrono::Utc;

    pub fn folder(raw: &str) -> FolderPathKey {
        FolderPathKey::parse(raw)
    }

    /// Record with full metadata.
    pub fn record(id: i64, name: &str, folder: &str) -> DocumentRecord {
        DocumentRecord::new(DocumentId::new(id), name, FolderPathKey::parse(folder))
            .with_type("pdf")
            .with_uploaded_at(Utc::now())
            .with_size(2048)
            .with_tags(["fixture"])
    }

    /// Record without server metadata.
    pub fn placeholder(id: i64, name: &str, folder: &str) -> DocumentRecord {
        DocumentRecord::new(DocumentId::new(id), name, FolderPathKey::parse(folder))
    }

    /// Engine config with short windows for paused-clock tests.
    pub fn fast_config() -> EngineConfig {
        EngineConfig::default()
            .with_add_refetch_delay(std::time::Duration::from_millis(10))
    }

    pub fn socket_move(source: &str, target: &str) -> MutationEvent {
        MutationEvent::new(EventKind::Move, OriginChannel::Socket)
            .from_path(source)
            .to_path(target)
    }

    pub fn signal_move(source: &str, target: &str) -> MutationEvent {
        MutationEvent::new(EventKind::Move, OriginChannel::Signal)
            .from_path(source)
            .to_path(target)
    }

    pub fn socket_add(target: &str) -> MutationEvent {
        MutationEvent::new(EventKind::Add, OriginChannel::Socket).to_path(target)
    }

    pub fn socket_delete(source: &str) -> MutationEvent {
        MutationEvent::new(EventKind::Delete, OriginChannel::Socket).from_path(source)
    }

    pub fn socket_folder(change: FolderChange, path: &str) -> MutationEvent {
        let event = MutationEvent::new(EventKind::FolderStructural(change), OriginChannel::Socket);
        match change {
            FolderChange::Created => event.to_path(path),
            FolderChange::Removed | FolderChange::Moved => event.from_path(path),
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Listing checks shared by engine and client tests.

    use super::*;

    /// No two live records share a name.
    pub fn assert_unique_names(documents: &[DocumentRecord]) {
        let mut seen = std::collections::HashSet::new();
        for record in documents.iter().filter(|r| !r.deleted) {
            assert!(
                seen.insert(record.name.to_lowercase()),
                "Duplicate document name in listing: {}",
                record.name
            );
        }
    }

    /// The listing shows exactly `names`, in order.
    pub fn assert_names(documents: &[DocumentRecord], names: &[&str]) {
        let actual: Vec<&str> = documents.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(actual, names, "Unexpected listing");
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[tokio::test]
    async fn test_mock_serves_listing_and_counts() {
        let source = MockSource::new().with_listing("Org", vec![record(1, "a.pdf", "org")]);
        let docs = source.fetch_documents(&folder("org")).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(source.fetches_of("ORG"), 1);
        assert_eq!(source.document_fetches(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_is_one_shot() {
        let source = MockSource::new();
        source.fail_next("org", FetchError::transient("fetch_documents", "reset"));
        assert!(source.fetch_documents(&folder("org")).await.is_err());
        assert!(source.fetch_documents(&folder("org")).await.is_ok());
    }
}
