//! Docket Core - Entity Types
//!
//! Pure data structures shared by the cache engine and the client. This crate
//! holds path normalization, document records, mutation events, configuration
//! and errors, plus the [`DocumentSource`] trait the engine fetches through.

pub mod config;
pub mod entities;
pub mod error;
pub mod event;
pub mod identity;
pub mod path;
pub mod source;

pub use config::EngineConfig;
pub use entities::{CacheEntry, DocumentRecord, FolderNode, RecordMatcher, MAX_KEYWORDS};
pub use error::{ConfigError, DocketError, DocketResult, EngineError, EventError, FetchError};
pub use event::{
    EventKind, FolderChange, MutationEvent, MutationEventKey, OriginChannel, SuppressionKey,
};
pub use identity::{DocumentId, TemporaryIds, Timestamp};
pub use path::{
    document_name, document_path, looks_like_file, normalize_name, FolderPathKey,
    PathNormalizer, DEFAULT_ROOT_MARKER,
};
pub use source::DocumentSource;
