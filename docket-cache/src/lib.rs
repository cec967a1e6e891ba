//! Docket Cache - Folder View Engine
//!
//! Keeps a client-side cache of folder listings consistent with a document
//! server that reports changes over several channels at once:
//!
//! - the live push socket,
//! - the sync agent's signal file,
//! - locally confirmed user actions.
//!
//! Events from all of them go through one [`MutationReconciler`], which
//! applies trusted changes optimistically and falls back to staleness marks
//! and refetches when it cannot be precise. [`NavigationController`] decides
//! between a cache render and a forced fetch when a folder is entered, and
//! [`CacheService`] owns the whole state behind one handle.

pub mod dedup;
pub mod expiring;
pub mod invalidation;
pub mod local;
pub mod navigation;
pub mod reconciler;
pub mod service;
pub mod state;
pub mod store;
pub mod suppression;
pub mod view;

pub use dedup::EventDeduplicator;
pub use expiring::ExpiringKeySet;
pub use invalidation::InvalidationRegistry;
pub use local::LocalMutation;
pub use navigation::{
    FetchOutcome, FetchReason, FetchTicket, FolderVersion, NavigationController, NavigationPlan,
};
pub use reconciler::{FollowUp, MutationReconciler, ReconcileOutcome, Reconciliation, ResolvedEvent};
pub use service::{CacheService, NavigationOutcome};
pub use state::EngineState;
pub use store::{DocumentCacheStore, FolderTree, MoveResult, StoreStats, Upserted};
pub use suppression::SuppressionRegistry;
pub use view::{Generation, ViewSnapshot, ViewState, ViewStatus};
