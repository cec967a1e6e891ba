//! Channel adapters.
//!
//! Turns socket frames and signal-file lines into [`MutationEvent`]s. Paths
//! stay raw here; only their shape is checked. Folder keys are derived by the
//! reconciler.

use crate::events::PushEvent;
use chrono::Utc;
use docket_core::{
    document_name, DocumentId, EventError, EventKind, FolderChange, MutationEvent, OriginChannel,
    PathNormalizer,
};

/// Map a wire `type` onto an event kind.
pub fn classify(event_type: &str) -> Result<EventKind, EventError> {
    let normalized = event_type.trim().to_ascii_lowercase().replace('-', "_");
    let kind = match normalized.as_str() {
        "move" | "moved" | "document_moved" => EventKind::Move,
        "add" | "upload" | "document_added" => EventKind::Add,
        "delete" | "deleted" | "document_deleted" => EventKind::Delete,
        "restore" | "restored" | "document_restored" => EventKind::Restore,
        "create_folder" | "folder_created" => EventKind::FolderStructural(FolderChange::Created),
        "remove_folder" | "delete_folder" | "folder_removed" => {
            EventKind::FolderStructural(FolderChange::Removed)
        }
        "move_folder" | "rename_folder" | "folder_moved" => {
            EventKind::FolderStructural(FolderChange::Moved)
        }
        _ => {
            return Err(EventError::UnknownType {
                event_type: event_type.to_string(),
            })
        }
    };
    Ok(kind)
}

/// Normalizes inbound channel payloads into engine events.
#[derive(Debug, Clone, Default)]
pub struct EventAdapter {
    normalizer: PathNormalizer,
}

impl EventAdapter {
    pub fn new(normalizer: PathNormalizer) -> Self {
        Self { normalizer }
    }

    /// Decode one JSON line or frame.
    pub fn decode(&self, raw: &str, origin: OriginChannel) -> Result<MutationEvent, EventError> {
        let event: PushEvent =
            serde_json::from_str(raw.trim()).map_err(|e| EventError::Malformed {
                reason: e.to_string(),
            })?;
        self.to_mutation(&event, origin)
    }

    pub fn to_mutation(
        &self,
        event: &PushEvent,
        origin: OriginChannel,
    ) -> Result<MutationEvent, EventError> {
        let kind = classify(&event.event_type)?;
        let missing = |field: &str| EventError::MissingField {
            event_type: event.event_type.clone(),
            field: field.to_string(),
        };

        let source = self.checked(event.source_path.as_deref())?;
        let target_path = self.checked(event.target_path.as_deref())?;
        let target_folder = self.checked(event.target_folder.as_deref())?;

        let name = event
            .document_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| match kind {
                EventKind::Add | EventKind::Restore => target_path.and_then(document_name),
                _ => None,
            })
            .or_else(|| source.and_then(document_name));

        // A bare target folder gets the name appended, so a dotted last
        // folder segment is not mistaken for a file name.
        let target = match (target_path, target_folder) {
            (Some(path), _) => Some(path.to_string()),
            (None, Some(folder)) => match (&name, kind) {
                (Some(name), EventKind::Move | EventKind::Add | EventKind::Restore) => {
                    Some(format!("{}/{}", folder.trim_end_matches(['/', '\\']), name))
                }
                _ => Some(folder.to_string()),
            },
            (None, None) => None,
        };

        let (from, to) = match kind {
            EventKind::Move | EventKind::FolderStructural(FolderChange::Moved) => (
                Some(source.ok_or_else(|| missing("sourcePath"))?.to_string()),
                Some(target.ok_or_else(|| missing("targetPath"))?),
            ),
            EventKind::Add => (
                source.map(str::to_string),
                Some(target.ok_or_else(|| missing("targetPath"))?),
            ),
            EventKind::Delete | EventKind::FolderStructural(FolderChange::Removed) => {
                match (source, target) {
                    (Some(source), _) => (Some(source.to_string()), None),
                    (None, Some(target)) => (Some(target), None),
                    (None, None) => return Err(missing("sourcePath")),
                }
            }
            EventKind::Restore | EventKind::FolderStructural(FolderChange::Created) => {
                match (target, source) {
                    (Some(target), source) => (source.map(str::to_string), Some(target)),
                    (None, Some(source)) => (None, Some(source.to_string())),
                    (None, None) => return Err(missing("targetPath")),
                }
            }
        };

        let mut mutation =
            MutationEvent::new(kind, origin).at(event.timestamp.unwrap_or_else(Utc::now));
        mutation.source_path = from;
        mutation.target_path = to;
        if let Some(name) = name.filter(|_| !matches!(kind, EventKind::FolderStructural(_))) {
            mutation = mutation.named(name);
        }
        if let Some(id) = event.document_id {
            mutation = mutation.with_id(DocumentId::new(id));
        }
        Ok(mutation)
    }

    /// Reject paths that cannot be mapped onto the folder tree.
    fn checked<'a>(&self, raw: Option<&'a str>) -> Result<Option<&'a str>, EventError> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let unified = raw.trim().replace('\\', "/");
        if unified.is_empty() {
            return Ok(None);
        }
        let invalid = || EventError::InvalidPath {
            path: raw.to_string(),
        };
        if unified.split('/').any(|segment| segment.trim() == "..") {
            return Err(invalid());
        }
        if is_filesystem_path(&unified) && !self.normalizer.is_absolute(&unified) {
            return Err(invalid());
        }
        Ok(Some(raw))
    }
}

/// Drive-letter or UNC paths only come from the sync agent's filesystem.
fn is_filesystem_path(unified: &str) -> bool {
    let bytes = unified.as_bytes();
    let drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    drive || unified.starts_with("//")
}
