//! Mutation events fed to the reconciler.
//!
//! Every channel (local actions, the push socket, the signal file) is reduced
//! to one [`MutationEvent`] shape before it reaches the engine. Paths inside
//! the event are still raw; the reconciler normalizes them.

use crate::path::{document_path, normalize_name};
use crate::{DocumentId, DocumentRecord, FolderPathKey, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Channel an event arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginChannel {
    /// A locally confirmed user action.
    Local,
    /// The live push socket.
    Socket,
    /// The sync agent's out-of-band signal file.
    Signal,
}

impl OriginChannel {
    /// Events from other clients or the sync agent.
    pub fn is_external(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl fmt::Display for OriginChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Socket => write!(f, "socket"),
            Self::Signal => write!(f, "signal"),
        }
    }
}

/// Structural change to the folder tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderChange {
    Created,
    Removed,
    Moved,
}

/// Classified kind of a mutation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Move,
    Add,
    Delete,
    Restore,
    FolderStructural(FolderChange),
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move => write!(f, "move"),
            Self::Add => write!(f, "add"),
            Self::Delete => write!(f, "delete"),
            Self::Restore => write!(f, "restore"),
            Self::FolderStructural(FolderChange::Created) => write!(f, "create_folder"),
            Self::FolderStructural(FolderChange::Removed) => write!(f, "remove_folder"),
            Self::FolderStructural(FolderChange::Moved) => write!(f, "move_folder"),
        }
    }
}

// ============================================================================
// EVENT
// ============================================================================

/// A change to the document tree, as reported by one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEvent {
    pub kind: EventKind,
    /// Where the document (or folder) was before the change.
    pub source_path: Option<String>,
    /// Where it is after the change; a document path or a folder path.
    pub target_path: Option<String>,
    pub document_name: Option<String>,
    pub document_id: Option<DocumentId>,
    /// Best known full record, typically returned by a local REST call.
    pub record_hint: Option<DocumentRecord>,
    pub timestamp: Timestamp,
    pub origin: OriginChannel,
}

impl MutationEvent {
    pub fn new(kind: EventKind, origin: OriginChannel) -> Self {
        Self {
            kind,
            source_path: None,
            target_path: None,
            document_name: None,
            document_id: None,
            record_hint: None,
            timestamp: Utc::now(),
            origin,
        }
    }

    pub fn from_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn to_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: DocumentId) -> Self {
        self.document_id = Some(id);
        self
    }

    pub fn with_hint(mut self, record: DocumentRecord) -> Self {
        self.record_hint = Some(record);
        self
    }

    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ============================================================================
// REGISTRY KEYS
// ============================================================================

/// Identity of one logical change, used to reject duplicate deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationEventKey {
    pub name: String,
    pub source: FolderPathKey,
    pub target: FolderPathKey,
    pub kind: EventKind,
}

impl MutationEventKey {
    pub fn new(name: &str, source: FolderPathKey, target: FolderPathKey, kind: EventKind) -> Self {
        Self {
            name: normalize_name(name),
            source,
            target,
            kind,
        }
    }
}

impl fmt::Display for MutationEventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}->{}", self.kind, self.name, self.source, self.target)
    }
}

/// Path registered right after a locally confirmed mutation so that its
/// external echo is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SuppressionKey {
    Folder(FolderPathKey),
    /// Full document path, see [`document_path`].
    Document(String),
}

impl SuppressionKey {
    pub fn folder(folder: &FolderPathKey) -> Self {
        Self::Folder(folder.clone())
    }

    pub fn document(folder: &FolderPathKey, name: &str) -> Self {
        Self::Document(document_path(folder, name))
    }
}

impl fmt::Display for SuppressionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Folder(key) => write!(f, "folder:{}", key),
            Self::Document(path) => write!(f, "document:{}", path),
        }
    }
}
