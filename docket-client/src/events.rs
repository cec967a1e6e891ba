//! Wire events from the push socket and the signal file, and the client's
//! internal event loop type.

use docket_core::{OriginChannel, Timestamp};
use serde::{Deserialize, Serialize};

/// One change notification as the server (or the sync agent) sends it.
///
/// Both channels use the same JSON shape. `type` is kept as a string so that
/// unknown types surface as an adapter error instead of a decode failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl PushEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_path: None,
            target_path: None,
            target_folder: None,
            document_name: None,
            document_id: None,
            timestamp: None,
        }
    }

    pub fn with_source(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn with_target(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    pub fn with_target_folder(mut self, folder: impl Into<String>) -> Self {
        self.target_folder = Some(folder.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.document_id = Some(id);
        self
    }
}

/// Everything the main loop reacts to.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A change notification from an external channel.
    Remote {
        origin: OriginChannel,
        event: Box<PushEvent>,
    },
    Connected,
    Disconnected { reason: String },
    /// A channel failed to deliver or decode a message.
    ChannelError {
        origin: OriginChannel,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_camel_case_payload() {
        let raw = r#"{
            "type": "move",
            "sourcePath": "/srv/uploads/Org/report.pdf",
            "targetFolder": "Org/Archive",
            "documentId": 42,
            "timestamp": "2026-03-01T10:00:00Z"
        }"#;
        let event: PushEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.event_type, "move");
        assert_eq!(event.target_folder.as_deref(), Some("Org/Archive"));
        assert_eq!(event.document_id, Some(42));
        assert!(event.document_name.is_none());
        assert!(event.timestamp.is_some());
    }

    #[test]
    fn test_unknown_type_still_decodes() {
        let event: PushEvent = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(event.event_type, "heartbeat");
    }

    #[test]
    fn test_serializes_without_absent_fields() {
        let event = PushEvent::new("add").with_target("Org/x.pdf");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"add","targetPath":"Org/x.pdf"}"#);
    }
}
