//! Cache service: the single entry point for navigation, channel events and
//! local mutations.
//!
//! All engine state sits behind one mutex that is only held for synchronous
//! sections. Network fetches happen outside the lock; the navigation
//! generation decides whether their results may still be applied.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use docket_core::{
    CacheEntry, DocumentId, DocumentSource, EngineConfig, EngineError, FetchError, FolderNode,
    FolderPathKey, MutationEvent,
};
use tokio::sync::watch;

use crate::local::LocalMutation;
use crate::navigation::{FetchOutcome, FetchReason, FolderVersion, NavigationPlan};
use crate::reconciler::{FollowUp, MutationReconciler, Reconciliation};
use crate::state::EngineState;
use crate::store::StoreStats;
use crate::view::{Generation, ViewSnapshot};

/// Result of [`CacheService::enter_folder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Rendered from the cache without a listing fetch.
    Cached {
        generation: Generation,
        documents: usize,
    },
    /// Fetched from the server and rendered.
    Fetched {
        generation: Generation,
        reason: FetchReason,
        documents: usize,
    },
    /// The fetch completed after the user had already moved on.
    Discarded { generation: Generation },
}

struct ServiceInner<S> {
    source: S,
    reconciler: MutationReconciler,
    state: Mutex<EngineState>,
    view_tx: watch::Sender<ViewSnapshot>,
}

/// Shared handle to the cache engine.
///
/// Cheap to clone; every clone drives the same state.
///
/// # Example
///
/// ```ignore
/// let service = CacheService::new(rest_client, EngineConfig::default());
/// let mut view = service.subscribe();
///
/// service.enter_folder(FolderPathKey::parse("Org/Team")).await?;
/// service.dispatch(&event)?;
/// println!("{:?}", view.borrow_and_update().names());
/// ```
pub struct CacheService<S> {
    inner: Arc<ServiceInner<S>>,
}

impl<S> Clone for CacheService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DocumentSource> CacheService<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        let state = EngineState::new(&config);
        let (view_tx, _) = watch::channel(state.navigation.snapshot());
        Self {
            inner: Arc::new(ServiceInner {
                source,
                reconciler: MutationReconciler::new(config),
                state: Mutex::new(state),
                view_tx,
            }),
        }
    }

    pub fn with_defaults(source: S) -> Self {
        Self::new(source, EngineConfig::default())
    }

    pub fn source(&self) -> &S {
        &self.inner.source
    }

    pub fn config(&self) -> &EngineConfig {
        self.inner.reconciler.config()
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    /// Enter `folder`, rendering from the cache when it can be trusted.
    ///
    /// A failed fetch sets the view to failed and is returned to the caller.
    pub async fn enter_folder(&self, folder: FolderPathKey) -> Result<NavigationOutcome, EngineError> {
        tracing::info!(folder = %folder, "Entering folder");
        let plan = self.with_state(|state| {
            state
                .navigation
                .begin(folder, &state.store, &mut state.invalidation)
        })?;

        let ticket = match plan {
            NavigationPlan::Render {
                folder,
                generation,
                documents,
            } => {
                let count = documents.len();
                self.spawn_thumbnail_refresh(folder, documents);
                return Ok(NavigationOutcome::Cached {
                    generation,
                    documents: count,
                });
            }
            NavigationPlan::Fetch(ticket) => ticket,
        };

        let result = self.inner.source.fetch_documents(&ticket.folder).await;
        let folder = ticket.folder.clone();
        let reason = ticket.reason;
        let outcome = self.with_state(|state| state.navigation.complete(ticket, result, &mut state.store))?;

        match outcome {
            FetchOutcome::Rendered {
                generation,
                documents,
                ..
            } => Ok(NavigationOutcome::Fetched {
                generation,
                reason,
                documents,
            }),
            FetchOutcome::Discarded { stale, .. } => Ok(NavigationOutcome::Discarded { generation: stale }),
            FetchOutcome::Failed(source) => {
                tracing::warn!(folder = %folder, error = %source, "Folder fetch failed");
                Err(EngineError::Fetch { folder, source })
            }
        }
    }

    /// Fire-and-forget [`enter_folder`](Self::enter_folder) for UI callers
    /// that follow the view through [`subscribe`](Self::subscribe).
    pub fn request_navigation(&self, folder: FolderPathKey) {
        let service = self.clone();
        self.spawn(async move {
            if let Err(e) = service.enter_folder(folder).await {
                tracing::warn!(error = %e, "Navigation failed");
            }
        });
    }

    /// Cache-bypassing refetch of one folder.
    ///
    /// Updates the cache entry, and the view when it shows `folder`. A folder
    /// changed while the fetch was in flight keeps its entry and stays stale.
    pub async fn refresh_folder(&self, folder: &FolderPathKey) -> Result<(), EngineError> {
        let started = self.read_state(|state| {
            FolderVersion::of(folder, &state.store, &state.invalidation)
        })?;
        let documents = self
            .inner
            .source
            .fetch_documents(folder)
            .await
            .map_err(|source| EngineError::Fetch {
                folder: folder.clone(),
                source,
            })?;
        let visible = self.with_state(|state| {
            state.navigation.apply_refresh(
                folder,
                started,
                documents,
                &mut state.store,
                &mut state.invalidation,
            )
        })?;
        tracing::debug!(folder = %folder, visible, "Folder refreshed");
        Ok(())
    }

    /// Folder tree, fetched when missing or invalidated.
    pub async fn folder_tree(&self) -> Result<Vec<FolderNode>, EngineError> {
        let cached = self.read_state(|state| {
            if state.store.tree_is_stale() {
                None
            } else {
                Some(state.store.tree().nodes().cloned().collect::<Vec<_>>())
            }
        })?;
        if let Some(nodes) = cached {
            return Ok(nodes);
        }
        self.refresh_tree().await
    }

    pub async fn refresh_tree(&self) -> Result<Vec<FolderNode>, EngineError> {
        let nodes = self
            .inner
            .source
            .fetch_folder_tree()
            .await
            .map_err(|source| EngineError::Fetch {
                folder: FolderPathKey::root(),
                source,
            })?;
        self.with_state(|state| state.store.set_tree(nodes.clone()))?;
        Ok(nodes)
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Reconcile an event from the push socket or the signal file.
    pub fn dispatch(&self, event: &MutationEvent) -> Result<Reconciliation, EngineError> {
        let result = self.with_state(|state| self.inner.reconciler.apply(state, event))?;
        self.schedule(&result.follow_ups);
        Ok(result)
    }

    /// Apply a locally confirmed mutation and suppress its echoes.
    ///
    /// Call right after the REST call succeeds.
    pub fn notify_local_mutation(&self, mutation: &LocalMutation) -> Result<Reconciliation, EngineError> {
        tracing::debug!(mutation = mutation.label(), "Local mutation confirmed");
        let result = self.with_state(|state| self.inner.reconciler.apply_local(state, mutation))?;
        self.schedule(&result.follow_ups);
        Ok(result)
    }

    /// Force the next visit of `folder` to bypass the cache.
    pub fn mark_stale(&self, folder: &FolderPathKey) -> Result<(), EngineError> {
        self.with_state(|state| state.invalidation.mark_stale(folder))
    }

    // ========================================================================
    // OBSERVATION
    // ========================================================================

    pub fn snapshot(&self) -> Result<ViewSnapshot, EngineError> {
        self.read_state(|state| state.navigation.snapshot())
    }

    /// Receive a snapshot after every change to the visible listing.
    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.inner.view_tx.subscribe()
    }

    pub fn stats(&self) -> Result<StoreStats, EngineError> {
        self.read_state(|state| state.store.stats())
    }

    pub fn cached(&self, folder: &FolderPathKey) -> Result<Option<CacheEntry>, EngineError> {
        self.read_state(|state| state.store.get(folder).cloned())
    }

    /// Whether `folder` carries a staleness mark. Does not consume it.
    pub fn is_marked_stale(&self, folder: &FolderPathKey) -> Result<bool, EngineError> {
        self.read_state(|state| state.invalidation.peek(folder))
    }

    pub fn current_folder(&self) -> Result<Option<FolderPathKey>, EngineError> {
        self.read_state(|state| state.navigation.current_folder().cloned())
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn lock(&self) -> Result<MutexGuard<'_, EngineState>, EngineError> {
        self.inner.state.lock().map_err(|_| EngineError::LockPoisoned)
    }

    fn read_state<R>(&self, f: impl FnOnce(&EngineState) -> R) -> Result<R, EngineError> {
        let state = self.lock()?;
        Ok(f(&state))
    }

    /// Run `f` under the lock and publish the view if it changed.
    fn with_state<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> Result<R, EngineError> {
        let (result, snapshot) = {
            let mut state = self.lock()?;
            let result = f(&mut state);
            (result, state.navigation.snapshot())
        };
        self.inner.view_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        Ok(result)
    }

    fn schedule(&self, follow_ups: &[FollowUp]) {
        for follow_up in follow_ups.iter().cloned() {
            let service = self.clone();
            match follow_up {
                FollowUp::RefetchDocuments { folder, delay } => self.spawn(async move {
                    sleep_for(delay).await;
                    if let Err(e) = service.refresh_folder(&folder).await {
                        tracing::warn!(folder = %folder, error = %e, "Background refetch failed");
                    }
                }),
                FollowUp::RefetchTree { delay } => self.spawn(async move {
                    sleep_for(delay).await;
                    if let Err(e) = service.refresh_tree().await {
                        tracing::warn!(error = %e, "Folder tree refetch failed");
                    }
                }),
            }
        }
    }

    fn spawn_thumbnail_refresh(&self, folder: FolderPathKey, documents: Vec<DocumentId>) {
        if documents.is_empty() {
            return;
        }
        let service = self.clone();
        self.spawn(async move {
            let result: Result<(), FetchError> =
                service.inner.source.refresh_thumbnails(&folder, &documents).await;
            if let Err(e) = result {
                tracing::warn!(folder = %folder, error = %e, "Thumbnail refresh failed");
            }
        });
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => tracing::warn!("No async runtime; background task skipped"),
        }
    }
}

async fn sleep_for(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
