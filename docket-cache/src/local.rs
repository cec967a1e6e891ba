//! Locally confirmed mutations.
//!
//! Reported by the client right after a REST call succeeds, before the
//! server's broadcast of the same change can arrive.

use crate::reconciler::ResolvedEvent;
use docket_core::{
    DocumentId, DocumentRecord, EventKind, FolderChange, FolderPathKey, OriginChannel,
    SuppressionKey,
};

/// A mutation the user just performed and the server accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalMutation {
    Move {
        source: FolderPathKey,
        target: FolderPathKey,
        name: String,
        /// Record returned by the move call, if any.
        record: Option<DocumentRecord>,
    },
    Delete {
        folder: FolderPathKey,
        name: String,
        id: Option<DocumentId>,
    },
    Restore {
        folder: FolderPathKey,
        name: String,
        record: Option<DocumentRecord>,
    },
    Rename {
        folder: FolderPathKey,
        from: String,
        to: String,
    },
    /// An upload was started; the matching add event is expected.
    Upload {
        folder: FolderPathKey,
        name: String,
        record: Option<DocumentRecord>,
    },
    CreateFolder {
        folder: FolderPathKey,
    },
    RemoveFolder {
        folder: FolderPathKey,
    },
    MoveFolder {
        from: FolderPathKey,
        to: FolderPathKey,
    },
}

impl LocalMutation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Delete { .. } => "delete",
            Self::Restore { .. } => "restore",
            Self::Rename { .. } => "rename",
            Self::Upload { .. } => "upload",
            Self::CreateFolder { .. } => "create_folder",
            Self::RemoveFolder { .. } => "remove_folder",
            Self::MoveFolder { .. } => "move_folder",
        }
    }

    /// Paths whose external echoes must be ignored after this mutation.
    pub fn suppression_keys(&self) -> Vec<SuppressionKey> {
        match self {
            Self::Move {
                source,
                target,
                name,
                ..
            } => vec![
                SuppressionKey::document(source, name),
                SuppressionKey::document(target, name),
            ],
            Self::Delete { folder, name, .. } | Self::Restore { folder, name, .. } => {
                vec![SuppressionKey::document(folder, name)]
            }
            Self::Rename { folder, from, to } => vec![
                SuppressionKey::document(folder, from),
                SuppressionKey::document(folder, to),
            ],
            Self::Upload { .. } => Vec::new(),
            Self::CreateFolder { folder } | Self::RemoveFolder { folder } => {
                vec![SuppressionKey::folder(folder)]
            }
            Self::MoveFolder { from, to } => {
                vec![SuppressionKey::folder(from), SuppressionKey::folder(to)]
            }
        }
    }

    /// The equivalent already-normalized event, for mutations that go
    /// through the regular reconciliation path.
    ///
    /// Renames and uploads have no channel event counterpart.
    pub fn resolve(&self) -> Option<ResolvedEvent> {
        let event = match self {
            Self::Move {
                source,
                target,
                name,
                record,
            } => ResolvedEvent {
                kind: EventKind::Move,
                source: Some(source.clone()),
                target: Some(target.clone()),
                name: Some(name.clone()),
                id: record.as_ref().map(|r| r.id),
                hint: record.clone(),
                origin: OriginChannel::Local,
            },
            Self::Delete { folder, name, id } => ResolvedEvent {
                kind: EventKind::Delete,
                source: Some(folder.clone()),
                target: None,
                name: Some(name.clone()),
                id: *id,
                hint: None,
                origin: OriginChannel::Local,
            },
            Self::Restore {
                folder,
                name,
                record,
            } => ResolvedEvent {
                kind: EventKind::Restore,
                source: None,
                target: Some(folder.clone()),
                name: Some(name.clone()),
                id: record.as_ref().map(|r| r.id),
                hint: record.clone(),
                origin: OriginChannel::Local,
            },
            Self::CreateFolder { folder } => {
                ResolvedEvent::folder(FolderChange::Created, None, Some(folder.clone()))
            }
            Self::RemoveFolder { folder } => {
                ResolvedEvent::folder(FolderChange::Removed, Some(folder.clone()), None)
            }
            Self::MoveFolder { from, to } => {
                ResolvedEvent::folder(FolderChange::Moved, Some(from.clone()), Some(to.clone()))
            }
            Self::Rename { .. } | Self::Upload { .. } => return None,
        };
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_suppresses_both_paths() {
        let mutation = LocalMutation::Move {
            source: FolderPathKey::parse("a"),
            target: FolderPathKey::parse("b"),
            name: "Report.pdf".to_string(),
            record: None,
        };
        assert_eq!(
            mutation.suppression_keys(),
            vec![
                SuppressionKey::Document("a/report.pdf".to_string()),
                SuppressionKey::Document("b/report.pdf".to_string()),
            ]
        );
        let event = mutation.resolve().unwrap();
        assert_eq!(event.kind, EventKind::Move);
        assert_eq!(event.origin, OriginChannel::Local);
    }

    #[test]
    fn test_folder_mutations_suppress_folders() {
        let mutation = LocalMutation::MoveFolder {
            from: FolderPathKey::parse("a"),
            to: FolderPathKey::parse("b/a"),
        };
        assert_eq!(mutation.suppression_keys().len(), 2);
        assert_eq!(
            mutation.resolve().unwrap().kind,
            EventKind::FolderStructural(FolderChange::Moved)
        );
    }

    #[test]
    fn test_rename_and_upload_have_no_event() {
        let rename = LocalMutation::Rename {
            folder: FolderPathKey::root(),
            from: "a.pdf".to_string(),
            to: "b.pdf".to_string(),
        };
        let upload = LocalMutation::Upload {
            folder: FolderPathKey::root(),
            name: "a.pdf".to_string(),
            record: None,
        };
        assert!(rename.resolve().is_none());
        assert!(upload.resolve().is_none());
        assert!(upload.suppression_keys().is_empty());
        assert_eq!(rename.label(), "rename");
    }
}
