//! The listing currently on screen.

use docket_core::{DocumentRecord, FolderPathKey, RecordMatcher};
use serde::Serialize;

/// Monotonic navigation counter.
///
/// Every folder entry bumps it; a fetch result tagged with an older
/// generation is discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(u64);

impl Generation {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Load state of the visible listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum ViewStatus {
    /// Nothing has been navigated to yet.
    Idle,
    Loading,
    Ready,
    Failed(String),
    /// The folder on screen was removed.
    Removed,
}

/// Snapshot published to view subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub folder: Option<FolderPathKey>,
    pub generation: Generation,
    pub documents: Vec<DocumentRecord>,
    pub status: ViewStatus,
}

impl ViewSnapshot {
    pub fn names(&self) -> Vec<&str> {
        self.documents.iter().map(|r| r.name.as_str()).collect()
    }
}

/// Mutable visible listing.
#[derive(Debug, Clone)]
pub struct ViewState {
    folder: Option<FolderPathKey>,
    documents: Vec<DocumentRecord>,
    status: ViewStatus,
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            folder: None,
            documents: Vec::new(),
            status: ViewStatus::Idle,
        }
    }

    pub fn folder(&self) -> Option<&FolderPathKey> {
        self.folder.as_ref()
    }

    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn status(&self) -> &ViewStatus {
        &self.status
    }

    /// Whether `folder` is the one on screen.
    pub fn is_showing(&self, folder: &FolderPathKey) -> bool {
        self.folder.as_ref() == Some(folder)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&DocumentRecord> {
        self.documents
            .iter()
            .find(|r| !r.deleted && r.matches_name(name))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.find_by_name(name).is_some()
    }

    /// Switch to `folder` and clear the list while its fetch is in flight.
    pub fn begin_loading(&mut self, folder: FolderPathKey) {
        self.folder = Some(folder);
        self.documents.clear();
        self.status = ViewStatus::Loading;
    }

    /// Show a listing for `folder`.
    pub fn show(&mut self, folder: FolderPathKey, documents: Vec<DocumentRecord>) {
        self.folder = Some(folder);
        self.documents = documents;
        self.status = ViewStatus::Ready;
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = ViewStatus::Failed(reason.into());
    }

    pub fn mark_removed(&mut self) {
        self.documents.clear();
        self.status = ViewStatus::Removed;
    }

    /// Point the view at a renamed or moved folder without reloading.
    pub fn retarget(&mut self, folder: FolderPathKey) {
        for record in &mut self.documents {
            record.folder = folder.clone();
        }
        self.folder = Some(folder);
    }

    pub fn prepend(&mut self, record: DocumentRecord) {
        self.documents.insert(0, record);
    }

    pub fn append(&mut self, record: DocumentRecord) {
        self.documents.push(record);
    }

    pub fn remove(&mut self, matcher: &RecordMatcher) -> Option<DocumentRecord> {
        let idx = self.documents.iter().position(|r| matcher.matches(r))?;
        Some(self.documents.remove(idx))
    }

    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        match self
            .documents
            .iter_mut()
            .find(|r| !r.deleted && r.matches_name(from))
        {
            Some(record) => {
                record.name = to.to_string();
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self, generation: Generation) -> ViewSnapshot {
        ViewSnapshot {
            folder: self.folder.clone(),
            generation,
            documents: self.documents.clone(),
            status: self.status.clone(),
        }
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::DocumentId;

    fn record(id: i64, name: &str) -> DocumentRecord {
        DocumentRecord::new(DocumentId::new(id), name, FolderPathKey::parse("a"))
    }

    #[test]
    fn test_generation_ordering() {
        let first = Generation::default().next();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.value(), 2);
    }

    #[test]
    fn test_list_mutations() {
        let mut view = ViewState::new();
        view.show(FolderPathKey::parse("a"), vec![record(1, "x.pdf")]);
        view.prepend(record(2, "y.pdf"));
        view.append(record(3, "z.pdf"));
        assert_eq!(view.snapshot(Generation::new(1)).names(), vec!["y.pdf", "x.pdf", "z.pdf"]);

        assert!(view.remove(&RecordMatcher::Name("X.PDF".to_string())).is_some());
        assert!(view.rename("z.pdf", "w.pdf"));
        assert!(view.contains_name("w.pdf"));
        assert!(!view.contains_name("x.pdf"));
    }

    #[test]
    fn test_loading_clears_list() {
        let mut view = ViewState::new();
        assert_eq!(view.status(), &ViewStatus::Idle);
        view.show(FolderPathKey::parse("a"), vec![record(1, "x.pdf")]);
        view.begin_loading(FolderPathKey::parse("b"));
        assert!(view.is_showing(&FolderPathKey::parse("b")));
        assert!(view.documents().is_empty());
        assert_eq!(view.status(), &ViewStatus::Loading);
    }

    #[test]
    fn test_retarget_rewrites_folder() {
        let mut view = ViewState::new();
        view.show(FolderPathKey::parse("a"), vec![record(1, "x.pdf")]);
        view.retarget(FolderPathKey::parse("b/a"));
        assert!(view.is_showing(&FolderPathKey::parse("b/a")));
        assert_eq!(view.documents()[0].folder, FolderPathKey::parse("b/a"));
    }
}
