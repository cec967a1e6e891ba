//! In-memory folder listing cache.
//!
//! Maps [`FolderPathKey`] to the last known listing of that folder and holds
//! the folder tree. Every operation is synchronous and mutates in place; the
//! reconciler applies optimistic changes here and authoritative fetches
//! replace whole entries.
//!
//! Entries are only created by [`DocumentCacheStore::set`]. Optimistic
//! operations never create an entry for a folder that was not fetched, since
//! a partial listing would later be rendered as if it were complete.

use chrono::Utc;
use docket_core::{
    CacheEntry, DocumentId, DocumentRecord, FolderNode, FolderPathKey, RecordMatcher,
    TemporaryIds, Timestamp,
};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// RESULTS
// ============================================================================

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted,
    Merged,
    /// The folder has no cache entry; nothing changed.
    NoEntry,
}

/// Result of [`DocumentCacheStore::move_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct MoveResult {
    /// Record as it now lives (or would live) in the target folder.
    pub record: DocumentRecord,
    /// Record removed from the source entry, if it was cached there.
    pub removed: Option<DocumentRecord>,
    /// Whether the target entry received the record.
    pub inserted: bool,
    /// True when no full record was known and a placeholder was synthesized.
    pub synthesized: bool,
}

/// Size of the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub entries: usize,
    pub documents: usize,
    pub placeholders: usize,
    pub folders: usize,
}

// ============================================================================
// FOLDER TREE
// ============================================================================

/// Cached folder tree.
#[derive(Debug, Clone, Default)]
pub struct FolderTree {
    nodes: BTreeMap<FolderPathKey, FolderNode>,
    fetched_at: Option<Timestamp>,
    stale: bool,
}

impl FolderTree {
    pub fn nodes(&self) -> impl Iterator<Item = &FolderNode> {
        self.nodes.values()
    }

    pub fn get(&self, key: &FolderPathKey) -> Option<&FolderNode> {
        self.nodes.get(key)
    }

    /// Direct children of `parent`.
    pub fn children(&self, parent: &FolderPathKey) -> Vec<&FolderNode> {
        self.nodes
            .values()
            .filter(|node| node.parent.as_ref() == Some(parent))
            .collect()
    }

    pub fn fetched_at(&self) -> Option<Timestamp> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Folder key to listing cache, plus the folder tree.
#[derive(Debug, Clone, Default)]
pub struct DocumentCacheStore {
    entries: BTreeMap<FolderPathKey, CacheEntry>,
    /// Bumped by every in-place change to a folder's listing.
    revisions: HashMap<FolderPathKey, u64>,
    tree: FolderTree,
    temporary_ids: TemporaryIds,
}

impl DocumentCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, folder: &FolderPathKey) -> Option<&CacheEntry> {
        self.entries.get(folder)
    }

    pub fn contains(&self, folder: &FolderPathKey) -> bool {
        self.entries.contains_key(folder)
    }

    pub fn folders(&self) -> impl Iterator<Item = &FolderPathKey> {
        self.entries.keys()
    }

    /// Count of optimistic changes made to `folder` so far.
    ///
    /// Wholesale replacement by [`DocumentCacheStore::set`] does not count.
    pub fn revision(&self, folder: &FolderPathKey) -> u64 {
        self.revisions.get(folder).copied().unwrap_or(0)
    }

    fn touch(&mut self, folder: &FolderPathKey) {
        let revision = self.revisions.entry(folder.clone()).or_insert(0);
        *revision = revision.wrapping_add(1);
    }

    /// Replace a folder's listing wholesale after an authoritative fetch.
    pub fn set(&mut self, folder: FolderPathKey, documents: Vec<DocumentRecord>) -> &CacheEntry {
        let documents = documents
            .into_iter()
            .map(|mut record| {
                record.folder = folder.clone();
                record
            })
            .collect();
        let entry = CacheEntry::new(folder.clone(), documents);
        self.entries.insert(folder.clone(), entry);
        &self.entries[&folder]
    }

    /// Insert `record` at the end of the folder's list, or merge it into the
    /// existing record with the same id or name.
    pub fn upsert(&mut self, folder: &FolderPathKey, record: DocumentRecord) -> Upserted {
        self.upsert_at(folder, record, false)
    }

    /// Like [`DocumentCacheStore::upsert`], but a new record goes first.
    pub fn upsert_front(&mut self, folder: &FolderPathKey, record: DocumentRecord) -> Upserted {
        self.upsert_at(folder, record, true)
    }

    fn upsert_at(&mut self, folder: &FolderPathKey, record: DocumentRecord, front: bool) -> Upserted {
        let Some(entry) = self.entries.get_mut(folder) else {
            return Upserted::NoEntry;
        };
        let record = record.relocated(folder);
        let by_id = RecordMatcher::best(Some(record.id), &record.name);
        let by_name = RecordMatcher::Name(record.name.clone());
        let existing = entry
            .documents
            .iter()
            .position(|r| by_id.matches(r))
            .or_else(|| entry.documents.iter().position(|r| !r.deleted && by_name.matches(r)));

        let upserted = match existing {
            Some(idx) => {
                entry.documents[idx].merge_from(record);
                Upserted::Merged
            }
            None if front => {
                entry.documents.insert(0, record);
                Upserted::Inserted
            }
            None => {
                entry.documents.push(record);
                Upserted::Inserted
            }
        };
        self.touch(folder);
        upserted
    }

    /// Remove the first matching record from a folder's list.
    pub fn remove(
        &mut self,
        folder: &FolderPathKey,
        matcher: &RecordMatcher,
    ) -> Option<DocumentRecord> {
        let entry = self.entries.get_mut(folder)?;
        let idx = entry.documents.iter().position(|r| matcher.matches(r))?;
        let removed = entry.documents.remove(idx);
        self.touch(folder);
        Some(removed)
    }

    /// Allocate a placeholder record for a document whose metadata is not
    /// known yet.
    pub fn placeholder(&mut self, name: &str, folder: &FolderPathKey) -> DocumentRecord {
        DocumentRecord::new(self.temporary_ids.allocate(), name, folder.clone())
    }

    pub fn allocate_temporary_id(&mut self) -> DocumentId {
        self.temporary_ids.allocate()
    }

    /// Most complete cached record with this name.
    ///
    /// A copy in `prefer` wins over copies elsewhere, regardless of
    /// completeness.
    pub fn find_best_known(
        &self,
        name: &str,
        prefer: Option<&FolderPathKey>,
    ) -> Option<DocumentRecord> {
        if let Some(record) = prefer
            .and_then(|folder| self.entries.get(folder))
            .and_then(|entry| entry.find_by_name(name))
        {
            return Some(record.clone());
        }
        self.entries
            .values()
            .filter_map(|entry| entry.find_by_name(name))
            .max_by_key(|record| record.completeness())
            .cloned()
    }

    /// Move a document between two folder entries.
    ///
    /// The source entry always loses the record. The target entry, if it is
    /// cached, gains the best known copy (or a placeholder) unless it already
    /// lists that name. Callers mark the target stale.
    pub fn move_document(
        &mut self,
        source: &FolderPathKey,
        target: &FolderPathKey,
        name: &str,
        hint: Option<DocumentRecord>,
    ) -> MoveResult {
        let best = hint.or_else(|| self.find_best_known(name, Some(source)));
        let matcher = match &best {
            Some(record) if record.matches_name(name) => RecordMatcher::best(Some(record.id), name),
            _ => RecordMatcher::Name(name.to_string()),
        };
        let removed = self
            .remove(source, &matcher)
            .or_else(|| self.remove(source, &RecordMatcher::Name(name.to_string())));

        let (record, synthesized) = match best.or_else(|| removed.clone()) {
            Some(known) => {
                let synthesized = known.is_placeholder();
                (known.relocated(target), synthesized)
            }
            None => (self.placeholder(name, target), true),
        };

        let target_lists_name = self.entries.get(target).map(|entry| entry.contains_name(name));
        let inserted = match target_lists_name {
            Some(false) => self.upsert(target, record.clone()) == Upserted::Inserted,
            _ => false,
        };

        MoveResult {
            record,
            removed,
            inserted,
            synthesized,
        }
    }

    /// Rename a record in place, keeping all other metadata.
    pub fn rename(&mut self, folder: &FolderPathKey, from: &str, to: &str) -> bool {
        let Some(entry) = self.entries.get_mut(folder) else {
            return false;
        };
        let Some(record) = entry
            .documents
            .iter_mut()
            .find(|r| !r.deleted && r.matches_name(from))
        else {
            return false;
        };
        record.name = to.to_string();
        self.touch(folder);
        true
    }

    /// Drop the entry for `folder` and every descendant entry, along with
    /// their tree nodes. Returns the number of entries dropped.
    pub fn remove_folder(&mut self, folder: &FolderPathKey) -> usize {
        let doomed = subtree_keys(&self.entries, folder);
        for key in &doomed {
            self.entries.remove(key);
            self.touch(key);
        }
        for key in subtree_keys(&self.tree.nodes, folder) {
            self.tree.nodes.remove(&key);
        }
        doomed.len()
    }

    /// Rekey `from` and its descendants under `to`, for entries and tree
    /// nodes alike. Returns the number of entries rekeyed.
    pub fn rebase_folder(&mut self, from: &FolderPathKey, to: &FolderPathKey) -> usize {
        if from == to || from.is_root() {
            return 0;
        }
        let keys = subtree_keys(&self.entries, from);
        let mut moved = Vec::with_capacity(keys.len());
        for key in keys {
            self.touch(&key);
            if let (Some(mut entry), Some(new_key)) = (self.entries.remove(&key), key.rebase(from, to)) {
                self.touch(&new_key);
                entry.folder = new_key.clone();
                for record in &mut entry.documents {
                    record.folder = new_key.clone();
                }
                moved.push((new_key, entry));
            }
        }
        let count = moved.len();
        self.entries.extend(moved);

        let node_keys = subtree_keys(&self.tree.nodes, from);
        let mut nodes = Vec::with_capacity(node_keys.len());
        for key in node_keys {
            if let (Some(node), Some(new_key)) = (self.tree.nodes.remove(&key), key.rebase(from, to)) {
                let name = if key == *from {
                    to.name().to_string()
                } else {
                    node.name
                };
                nodes.push((new_key.clone(), FolderNode::new(new_key, name)));
            }
        }
        self.tree.nodes.extend(nodes);
        count
    }

    // ------------------------------------------------------------------------
    // Folder tree
    // ------------------------------------------------------------------------

    pub fn tree(&self) -> &FolderTree {
        &self.tree
    }

    pub fn set_tree(&mut self, nodes: Vec<FolderNode>) {
        self.tree.nodes = nodes.into_iter().map(|n| (n.key.clone(), n)).collect();
        self.tree.fetched_at = Some(Utc::now());
        self.tree.stale = false;
    }

    pub fn invalidate_tree(&mut self) {
        self.tree.stale = true;
    }

    /// True when the tree was never fetched or has been invalidated.
    pub fn tree_is_stale(&self) -> bool {
        self.tree.stale || self.tree.fetched_at.is_none()
    }

    pub fn stats(&self) -> StoreStats {
        let documents = self.entries.values().map(|e| e.documents.len()).sum();
        let placeholders = self
            .entries
            .values()
            .flat_map(|e| e.documents.iter())
            .filter(|r| r.is_placeholder())
            .count();
        StoreStats {
            entries: self.entries.len(),
            documents,
            placeholders,
            folders: self.tree.len(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.tree = FolderTree::default();
    }
}

/// Keys equal to or beneath `folder`.
///
/// All keys sharing `folder` as a string prefix are contiguous in the ordered
/// map, so this is one range scan stopping at the first non-prefixed key.
fn subtree_keys<V>(map: &BTreeMap<FolderPathKey, V>, folder: &FolderPathKey) -> Vec<FolderPathKey> {
    map.range(folder.clone()..)
        .take_while(|(key, _)| key.as_str().starts_with(folder.as_str()))
        .filter(|(key, _)| key.is_within(folder))
        .map(|(key, _)| key.clone())
        .collect()
}
