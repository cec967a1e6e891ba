//! Identity types for Docket documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Server-assigned document identifier.
///
/// Positive values come from the backend. Zero and negative values are
/// synthesized by the client for placeholder records whose real id is not
/// known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(i64);

impl DocumentId {
    /// Wrap a raw id.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Get the raw id value.
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns true for client-synthesized ids.
    pub const fn is_temporary(&self) -> bool {
        self.0 <= 0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DocumentId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Allocator for temporary (negative) document ids.
///
/// Each allocator hands out strictly decreasing ids starting at -1, so a
/// placeholder id never collides with a server id.
#[derive(Debug, Clone)]
pub struct TemporaryIds {
    next: i64,
}

impl TemporaryIds {
    pub fn new() -> Self {
        Self { next: -1 }
    }

    /// Allocate the next temporary id.
    pub fn allocate(&mut self) -> DocumentId {
        let id = DocumentId(self.next);
        self.next = self.next.saturating_sub(1);
        id
    }
}

impl Default for TemporaryIds {
    fn default() -> Self {
        Self::new()
    }
}
