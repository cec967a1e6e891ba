//! Core entity structures

use crate::path::normalize_name;
use crate::{DocumentId, FolderPathKey, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of keywords kept per document.
pub const MAX_KEYWORDS: usize = 5;

// ============================================================================
// DOCUMENT RECORD
// ============================================================================

/// One document as listed inside a folder.
///
/// Optional metadata is `None` when it is not known yet, which is what makes
/// a record a placeholder (see [`DocumentRecord::is_placeholder`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub name: String,
    pub folder: FolderPathKey,
    #[serde(rename = "type", default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<Timestamp>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl DocumentRecord {
    /// Create a record with no metadata beyond identity.
    pub fn new(id: DocumentId, name: impl Into<String>, folder: FolderPathKey) -> Self {
        Self {
            id,
            name: name.into(),
            folder,
            doc_type: None,
            uploaded_at: None,
            size_bytes: None,
            tags: Vec::new(),
            keywords: Vec::new(),
            deleted: false,
        }
    }

    pub fn with_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn with_uploaded_at(mut self, uploaded_at: Timestamp) -> Self {
        self.uploaded_at = Some(uploaded_at);
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set keywords, keeping at most [`MAX_KEYWORDS`].
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords
            .into_iter()
            .take(MAX_KEYWORDS)
            .map(Into::into)
            .collect();
        self
    }

    /// A record whose full metadata is not confirmed by the server.
    pub fn is_placeholder(&self) -> bool {
        self.id.is_temporary() || self.uploaded_at.is_none() || self.doc_type.is_none()
    }

    /// Case-insensitive name comparison.
    pub fn matches_name(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }

    /// Copy of this record placed in another folder.
    pub fn relocated(&self, folder: &FolderPathKey) -> Self {
        let mut copy = self.clone();
        copy.folder = folder.clone();
        copy
    }

    /// Rough measure of how much metadata is known, used to pick the best
    /// copy among several cached records with the same name.
    pub fn completeness(&self) -> u8 {
        let mut score = 0;
        if !self.id.is_temporary() {
            score += 4;
        }
        if self.uploaded_at.is_some() {
            score += 2;
        }
        if self.doc_type.is_some() {
            score += 2;
        }
        if self.size_bytes.is_some() {
            score += 1;
        }
        if !self.tags.is_empty() {
            score += 1;
        }
        if !self.keywords.is_empty() {
            score += 1;
        }
        score
    }

    /// Merge a newer view of the same document into this one.
    ///
    /// Known values are only replaced by known values: a temporary id never
    /// overwrites a server id, and missing dates, types, sizes, tags or
    /// keywords never erase what is already cached.
    pub fn merge_from(&mut self, incoming: DocumentRecord) {
        if !incoming.id.is_temporary() || self.id.is_temporary() {
            self.id = incoming.id;
        }
        self.name = incoming.name;
        self.folder = incoming.folder;
        if incoming.doc_type.is_some() {
            self.doc_type = incoming.doc_type;
        }
        if incoming.uploaded_at.is_some() {
            self.uploaded_at = incoming.uploaded_at;
        }
        if incoming.size_bytes.is_some() {
            self.size_bytes = incoming.size_bytes;
        }
        if !incoming.tags.is_empty() {
            self.tags = incoming.tags;
        }
        if !incoming.keywords.is_empty() {
            self.keywords = incoming.keywords;
            self.keywords.truncate(MAX_KEYWORDS);
        }
        self.deleted = incoming.deleted;
    }
}

// ============================================================================
// MATCHING
// ============================================================================

/// How a record is located inside one folder's list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordMatcher {
    /// Match by server or temporary id.
    Id(DocumentId),
    /// Match by case-insensitive name.
    Name(String),
}

impl RecordMatcher {
    /// Prefer the id when it is a real server id, else fall back to the name.
    pub fn best(id: Option<DocumentId>, name: &str) -> Self {
        match id {
            Some(id) if !id.is_temporary() => Self::Id(id),
            _ => Self::Name(name.to_string()),
        }
    }

    pub fn matches(&self, record: &DocumentRecord) -> bool {
        match self {
            Self::Id(id) => record.id == *id,
            Self::Name(name) => record.matches_name(name),
        }
    }
}

// ============================================================================
// CACHE ENTRY
// ============================================================================

/// Cached listing of one folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub folder: FolderPathKey,
    pub documents: Vec<DocumentRecord>,
    pub fetched_at: Timestamp,
}

impl CacheEntry {
    /// Build an entry, collapsing non-deleted records that share a name.
    ///
    /// The first occurrence keeps its position; later duplicates are merged
    /// into it.
    pub fn new(folder: FolderPathKey, documents: Vec<DocumentRecord>) -> Self {
        let mut unique: Vec<DocumentRecord> = Vec::with_capacity(documents.len());
        for record in documents {
            let existing = unique
                .iter_mut()
                .find(|r| !r.deleted && !record.deleted && r.matches_name(&record.name));
            match existing {
                Some(existing) => existing.merge_from(record),
                None => unique.push(record),
            }
        }
        Self {
            folder,
            documents: unique,
            fetched_at: Utc::now(),
        }
    }

    pub fn find(&self, matcher: &RecordMatcher) -> Option<&DocumentRecord> {
        self.documents.iter().find(|r| matcher.matches(r))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&DocumentRecord> {
        self.documents
            .iter()
            .find(|r| !r.deleted && r.matches_name(name))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.find_by_name(name).is_some()
    }

    /// Whether any record still waits for authoritative metadata.
    pub fn has_placeholder(&self) -> bool {
        self.documents.iter().any(DocumentRecord::is_placeholder)
    }

    /// How long ago the entry was fetched.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

// ============================================================================
// FOLDER TREE
// ============================================================================

/// One folder in the cached folder tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    pub key: FolderPathKey,
    /// Display name with the server's casing.
    pub name: String,
    pub parent: Option<FolderPathKey>,
}

impl FolderNode {
    pub fn new(key: FolderPathKey, name: impl Into<String>) -> Self {
        let parent = key.parent();
        Self {
            key,
            name: name.into(),
            parent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full(id: i64, name: &str) -> DocumentRecord {
        DocumentRecord::new(DocumentId::new(id), name, FolderPathKey::parse("org"))
            .with_type("pdf")
            .with_uploaded_at(Utc::now())
            .with_size(1024)
            .with_tags(["finance"])
    }

    #[test]
    fn test_placeholder_detection() {
        let folder = FolderPathKey::parse("org");
        assert!(DocumentRecord::new(DocumentId::new(-1), "a.pdf", folder.clone()).is_placeholder());
        assert!(DocumentRecord::new(DocumentId::new(5), "a.pdf", folder.clone())
            .with_type("pdf")
            .is_placeholder());
        assert!(!full(5, "a.pdf").is_placeholder());
    }

    #[test]
    fn test_merge_keeps_known_metadata() {
        let mut cached = full(10, "a.pdf");
        let incoming = DocumentRecord::new(DocumentId::new(-4), "A.pdf", FolderPathKey::parse("org/b"));
        cached.merge_from(incoming);

        assert_eq!(cached.id, DocumentId::new(10));
        assert_eq!(cached.name, "A.pdf");
        assert_eq!(cached.folder.as_str(), "org/b");
        assert_eq!(cached.doc_type.as_deref(), Some("pdf"));
        assert!(cached.uploaded_at.is_some());
        assert_eq!(cached.tags, vec!["finance".to_string()]);
    }

    #[test]
    fn test_merge_replaces_temporary_id() {
        let mut placeholder = DocumentRecord::new(DocumentId::new(-2), "a.pdf", FolderPathKey::root());
        placeholder.merge_from(full(33, "a.pdf"));
        assert_eq!(placeholder.id, DocumentId::new(33));
        assert!(!placeholder.is_placeholder());
    }

    #[test]
    fn test_keywords_are_capped() {
        let record = full(1, "a.pdf").with_keywords(["a", "b", "c", "d", "e", "f", "g"]);
        assert_eq!(record.keywords.len(), MAX_KEYWORDS);
    }

    #[test]
    fn test_cache_entry_collapses_duplicate_names() {
        let entry = CacheEntry::new(
            FolderPathKey::parse("org"),
            vec![full(1, "a.pdf"), full(2, "b.pdf"), DocumentRecord::new(DocumentId::new(-1), "A.PDF", FolderPathKey::parse("org"))],
        );
        assert_eq!(entry.documents.len(), 2);
        assert_eq!(entry.documents[0].id, DocumentId::new(1));
        assert!(!entry.has_placeholder());
    }

    #[test]
    fn test_matcher_prefers_server_id() {
        assert_eq!(
            RecordMatcher::best(Some(DocumentId::new(9)), "a.pdf"),
            RecordMatcher::Id(DocumentId::new(9))
        );
        assert_eq!(
            RecordMatcher::best(Some(DocumentId::new(-9)), "a.pdf"),
            RecordMatcher::Name("a.pdf".to_string())
        );
        assert!(RecordMatcher::Name("A.PDF".to_string()).matches(&full(1, "a.pdf")));
    }

    #[test]
    fn test_record_wire_format_uses_type_field() {
        let json = r#"{"id": 4, "name": "x.pdf", "folder": "Org/Team", "type": "pdf"}"#;
        let record: DocumentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.doc_type.as_deref(), Some("pdf"));
        assert_eq!(record.folder.as_str(), "org/team");
        assert!(record.tags.is_empty());
    }
}
