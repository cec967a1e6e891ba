//! Folder navigation.
//!
//! Entering a folder either renders the cached listing or fetches it. The
//! decision and the application of the result are synchronous; the fetch
//! itself happens in between, outside any lock. Every entry bumps the
//! navigation [`Generation`] and a result carrying an older generation is
//! dropped, so a slow response for a folder the user already left can never
//! overwrite the current one.

use crate::invalidation::InvalidationRegistry;
use crate::store::DocumentCacheStore;
use crate::view::{Generation, ViewSnapshot, ViewState, ViewStatus};
use docket_core::{DocumentId, DocumentRecord, FetchError, FolderPathKey};

// ============================================================================
// PLANS AND OUTCOMES
// ============================================================================

/// Why a navigation bypasses the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    /// The folder carried a staleness mark.
    Invalidated,
    /// The cached entry still holds placeholder records.
    Placeholder,
    /// Nothing cached.
    Miss,
}

/// A fetch the caller must perform and hand back to
/// [`NavigationController::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub folder: FolderPathKey,
    pub generation: Generation,
    pub reason: FetchReason,
}

/// Result of [`NavigationController::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationPlan {
    /// Cached listing rendered; only thumbnails need refreshing.
    Render {
        folder: FolderPathKey,
        generation: Generation,
        documents: Vec<DocumentId>,
    },
    Fetch(FetchTicket),
}

/// Result of applying a navigation fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Rendered {
        folder: FolderPathKey,
        generation: Generation,
        documents: usize,
    },
    /// The user navigated elsewhere while the fetch was in flight.
    Discarded {
        folder: FolderPathKey,
        stale: Generation,
        current: Generation,
    },
    Failed(FetchError),
}

/// Change counters of one folder, taken when a background refetch starts.
///
/// A refetch whose folder changed while it was in flight may not reflect
/// that change, so it must not replace the entry or consume a newer mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FolderVersion {
    listing: u64,
    marks: u64,
}

impl FolderVersion {
    pub fn of(
        folder: &FolderPathKey,
        store: &DocumentCacheStore,
        invalidation: &InvalidationRegistry,
    ) -> Self {
        Self {
            listing: store.revision(folder),
            marks: invalidation.epoch(folder),
        }
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Current folder, navigation generation and visible listing.
#[derive(Debug, Clone, Default)]
pub struct NavigationController {
    generation: Generation,
    view: ViewState,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn current_folder(&self) -> Option<&FolderPathKey> {
        self.view.folder()
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.view.snapshot(self.generation)
    }

    /// Start entering `folder`.
    ///
    /// Consumes the folder's staleness mark. Renders straight from the cache
    /// when the entry is trustworthy, otherwise switches the view to loading
    /// and returns a fetch ticket.
    pub fn begin(
        &mut self,
        folder: FolderPathKey,
        store: &DocumentCacheStore,
        invalidation: &mut InvalidationRegistry,
    ) -> NavigationPlan {
        self.generation = self.generation.next();
        let stale = invalidation.is_stale(&folder);
        let entry = store.get(&folder);

        let reason = match entry {
            _ if stale => Some(FetchReason::Invalidated),
            Some(entry) if entry.has_placeholder() => Some(FetchReason::Placeholder),
            Some(_) => None,
            None => Some(FetchReason::Miss),
        };

        match (reason, entry) {
            (None, Some(entry)) => {
                let documents = entry.documents.iter().map(|r| r.id).collect();
                tracing::debug!(folder = %folder, generation = %self.generation, "Rendering cached folder");
                self.view.show(folder.clone(), entry.documents.clone());
                NavigationPlan::Render {
                    folder,
                    generation: self.generation,
                    documents,
                }
            }
            (reason, _) => {
                let reason = reason.unwrap_or(FetchReason::Miss);
                tracing::debug!(
                    folder = %folder,
                    generation = %self.generation,
                    reason = ?reason,
                    "Fetching folder"
                );
                self.view.begin_loading(folder.clone());
                NavigationPlan::Fetch(FetchTicket {
                    folder,
                    generation: self.generation,
                    reason,
                })
            }
        }
    }

    /// Apply the result of a navigation fetch.
    ///
    /// A result for an outdated generation touches neither the cache nor the
    /// view.
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<DocumentRecord>, FetchError>,
        store: &mut DocumentCacheStore,
    ) -> FetchOutcome {
        if ticket.generation != self.generation {
            tracing::debug!(
                folder = %ticket.folder,
                stale = %ticket.generation,
                current = %self.generation,
                "Discarding out-of-date folder response"
            );
            return FetchOutcome::Discarded {
                folder: ticket.folder,
                stale: ticket.generation,
                current: self.generation,
            };
        }

        match result {
            Ok(documents) => {
                let documents = store.set(ticket.folder.clone(), documents).documents.clone();
                let count = documents.len();
                self.view.show(ticket.folder.clone(), documents);
                FetchOutcome::Rendered {
                    folder: ticket.folder,
                    generation: ticket.generation,
                    documents: count,
                }
            }
            Err(err) => {
                self.view.fail(err.to_string());
                FetchOutcome::Failed(err)
            }
        }
    }

    /// Apply a cache-bypassing background refetch started at `started`.
    ///
    /// Refreshes the cache entry and clears the folder's staleness mark,
    /// unless the folder changed since the fetch started: then the entry is
    /// kept and the folder stays (or becomes) stale. The view is only
    /// replaced when it shows `folder` and no navigation fetch is pending.
    /// Returns true when the view changed.
    pub fn apply_refresh(
        &mut self,
        folder: &FolderPathKey,
        started: FolderVersion,
        documents: Vec<DocumentRecord>,
        store: &mut DocumentCacheStore,
        invalidation: &mut InvalidationRegistry,
    ) -> bool {
        if FolderVersion::of(folder, store, invalidation) != started {
            tracing::debug!(folder = %folder, "Refetch overtaken by a newer change; keeping entry");
            invalidation.mark_stale(folder);
            return false;
        }
        let documents = store.set(folder.clone(), documents).documents.clone();
        invalidation.clear(folder);
        let refreshable = matches!(self.view.status(), ViewStatus::Ready | ViewStatus::Failed(_));
        if self.view.is_showing(folder) && refreshable {
            self.view.show(folder.clone(), documents);
            return true;
        }
        false
    }
}
