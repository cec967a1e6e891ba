//! Everything the engine mutates, in one place.

use crate::dedup::EventDeduplicator;
use crate::invalidation::InvalidationRegistry;
use crate::navigation::NavigationController;
use crate::store::DocumentCacheStore;
use crate::suppression::SuppressionRegistry;
use docket_core::EngineConfig;

/// Cache, registries and navigation state.
///
/// Owned by [`crate::CacheService`] behind a single mutex. Fields are public
/// so that operations can borrow disjoint parts at once.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub store: DocumentCacheStore,
    pub invalidation: InvalidationRegistry,
    pub dedup: EventDeduplicator,
    pub suppression: SuppressionRegistry,
    pub navigation: NavigationController,
}

impl EngineState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            store: DocumentCacheStore::new(),
            invalidation: InvalidationRegistry::new(config.invalidation_ttl),
            dedup: EventDeduplicator::new(config.dedup_ttl, config.upload_window),
            suppression: SuppressionRegistry::new(config.suppression_ttl),
            navigation: NavigationController::new(),
        }
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
