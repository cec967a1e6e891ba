//! Mutation reconciliation.
//!
//! Applies mutation events from every channel to the cache and the visible
//! listing. Trusted signals are applied optimistically; anything the
//! reconciler cannot place precisely is covered by staleness marks or a
//! scheduled refetch, so the authoritative listing always wins eventually.
//!
//! The reconciler never performs I/O. Refetches are returned as
//! [`FollowUp`]s for the caller to schedule.

use crate::dedup::EventDeduplicator;
use crate::local::LocalMutation;
use crate::state::EngineState;
use crate::store::Upserted;
use docket_core::{
    document_name, DocumentId, DocumentRecord, EngineConfig, EventKind, FolderChange,
    FolderPathKey, MutationEvent, MutationEventKey, OriginChannel, PathNormalizer, RecordMatcher,
    SuppressionKey,
};
use std::time::Duration;

// ============================================================================
// RESOLVED EVENTS
// ============================================================================

/// A mutation event with its paths reduced to folder keys.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEvent {
    pub kind: EventKind,
    pub source: Option<FolderPathKey>,
    pub target: Option<FolderPathKey>,
    /// Document name with its original case.
    pub name: Option<String>,
    pub id: Option<DocumentId>,
    pub hint: Option<DocumentRecord>,
    pub origin: OriginChannel,
}

impl ResolvedEvent {
    pub(crate) fn folder(
        change: FolderChange,
        source: Option<FolderPathKey>,
        target: Option<FolderPathKey>,
    ) -> Self {
        Self {
            kind: EventKind::FolderStructural(change),
            source,
            target,
            name: None,
            id: None,
            hint: None,
            origin: OriginChannel::Local,
        }
    }

    /// Deduplication key of this event.
    pub fn key(&self) -> MutationEventKey {
        MutationEventKey::new(
            self.name.as_deref().unwrap_or_default(),
            self.source.clone().unwrap_or_default(),
            self.target.clone().unwrap_or_default(),
            self.kind,
        )
    }

    /// Paths checked against the suppression registry.
    pub fn suppression_candidates(&self) -> Vec<SuppressionKey> {
        let mut keys = Vec::new();
        if let Some(name) = &self.name {
            for folder in [&self.source, &self.target].into_iter().flatten() {
                keys.push(SuppressionKey::document(folder, name));
            }
        }
        if let Some(target) = &self.target {
            keys.push(SuppressionKey::folder(target));
        }
        if let (EventKind::FolderStructural(_), Some(source)) = (self.kind, &self.source) {
            keys.push(SuppressionKey::folder(source));
        }
        keys
    }
}

/// Dedup gate.
///
/// A locally confirmed mutation always applies; it only registers its key so
/// a later delivery over another channel is recognized. Document events
/// without a name have no meaningful key and are never deduplicated.
fn admit(dedup: &mut EventDeduplicator, event: &ResolvedEvent) -> bool {
    let keyed = event.name.is_some() || matches!(event.kind, EventKind::FolderStructural(_));
    if !keyed {
        return true;
    }
    let key = event.key();
    if event.origin.is_external() {
        dedup.should_process(&key)
    } else {
        dedup.record(key);
        true
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// What the reconciler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// State was mutated.
    Applied,
    /// Only a staleness mark was set; the folder is not on screen.
    Deferred,
    /// Same logical change already processed.
    Duplicate,
    /// Echo of a locally confirmed mutation.
    Suppressed,
    /// The event could not be placed precisely; affected folders were
    /// marked stale instead.
    Ambiguous,
    /// An add that is the echo of a recent move.
    EchoDropped,
    /// Nothing to do.
    Ignored,
}

/// Work scheduled by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    /// Cache-bypassing refetch of one folder.
    RefetchDocuments {
        folder: FolderPathKey,
        delay: Duration,
    },
    RefetchTree {
        delay: Duration,
    },
}

/// Report returned for every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub outcome: ReconcileOutcome,
    pub visible_changed: bool,
    pub follow_ups: Vec<FollowUp>,
}

impl Reconciliation {
    pub fn new(outcome: ReconcileOutcome) -> Self {
        Self {
            outcome,
            visible_changed: false,
            follow_ups: Vec::new(),
        }
    }

    fn visible(mut self, changed: bool) -> Self {
        self.visible_changed = changed;
        self
    }

    fn then(mut self, follow_up: FollowUp) -> Self {
        self.follow_ups.push(follow_up);
        self
    }

    pub fn is_applied(&self) -> bool {
        self.outcome == ReconcileOutcome::Applied
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

/// Applies mutation events to [`EngineState`].
#[derive(Debug, Clone)]
pub struct MutationReconciler {
    config: EngineConfig,
    normalizer: PathNormalizer,
}

impl MutationReconciler {
    pub fn new(config: EngineConfig) -> Self {
        let normalizer = config.normalizer();
        Self { config, normalizer }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reduce the raw paths of a channel event to folder keys.
    ///
    /// A missing document name is taken from the last segment of the source
    /// path (the target path for adds and restores).
    pub fn resolve(&self, event: &MutationEvent) -> ResolvedEvent {
        let structural = matches!(event.kind, EventKind::FolderStructural(_));
        let folder_of = |raw: &Option<String>| {
            raw.as_deref().map(|path| {
                if structural {
                    self.normalizer.normalize_folder(path)
                } else {
                    self.normalizer.normalize(path)
                }
            })
        };

        let (primary, secondary) = match event.kind {
            EventKind::Add | EventKind::Restore => (&event.target_path, &event.source_path),
            _ => (&event.source_path, &event.target_path),
        };
        let name = if structural {
            None
        } else {
            event
                .document_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .or_else(|| event.record_hint.as_ref().map(|r| r.name.clone()))
                .or_else(|| primary.as_deref().and_then(document_name))
                .or_else(|| secondary.as_deref().and_then(document_name))
        };

        ResolvedEvent {
            kind: event.kind,
            source: folder_of(&event.source_path),
            target: folder_of(&event.target_path),
            name,
            id: event.document_id,
            hint: event.record_hint.clone(),
            origin: event.origin,
        }
    }

    /// Apply a channel event.
    pub fn apply(&self, state: &mut EngineState, event: &MutationEvent) -> Reconciliation {
        let resolved = self.resolve(event);
        self.apply_resolved(state, resolved)
    }

    pub fn apply_resolved(&self, state: &mut EngineState, event: ResolvedEvent) -> Reconciliation {
        let kind = event.kind;
        let origin = event.origin;
        if origin.is_external()
            && state
                .suppression
                .any_suppressed(&event.suppression_candidates())
        {
            tracing::debug!(kind = %kind, origin = %origin, "Dropping echo of local mutation");
            return Reconciliation::new(ReconcileOutcome::Suppressed);
        }

        let result = match kind {
            EventKind::Move => self.apply_move(state, event),
            EventKind::Add => self.apply_add(state, event),
            EventKind::Delete => self.apply_delete(state, event),
            EventKind::Restore => self.apply_restore(state, event),
            EventKind::FolderStructural(change) => self.apply_folder_change(state, change, event),
        };
        tracing::debug!(
            kind = %kind,
            origin = %origin,
            outcome = ?result.outcome,
            follow_ups = result.follow_ups.len(),
            "Reconciled mutation event"
        );
        result
    }

    /// Apply a locally confirmed mutation and suppress its echoes.
    pub fn apply_local(&self, state: &mut EngineState, mutation: &LocalMutation) -> Reconciliation {
        let result = match mutation {
            LocalMutation::Rename { folder, from, to } => self.apply_rename(state, folder, from, to),
            LocalMutation::Upload {
                folder,
                name,
                record,
            } => self.apply_upload(state, folder, name, record.clone()),
            other => match other.resolve() {
                Some(event) => self.apply_resolved(state, event),
                None => Reconciliation::new(ReconcileOutcome::Ignored),
            },
        };
        for key in mutation.suppression_keys() {
            state.suppression.suppress(key);
        }
        result
    }

    fn apply_move(&self, state: &mut EngineState, event: ResolvedEvent) -> Reconciliation {
        let EngineState {
            store,
            invalidation,
            dedup,
            navigation,
            ..
        } = state;

        let (Some(source), Some(target)) = (event.source.clone(), event.target.clone()) else {
            for folder in [&event.source, &event.target].into_iter().flatten() {
                invalidation.mark_stale(folder);
            }
            return Reconciliation::new(ReconcileOutcome::Ambiguous);
        };
        if !admit(dedup, &event) {
            return Reconciliation::new(ReconcileOutcome::Duplicate);
        }
        let Some(name) = event.name.clone() else {
            invalidation.mark_stale(&source);
            invalidation.mark_stale(&target);
            return Reconciliation::new(ReconcileOutcome::Ambiguous);
        };
        if source == target {
            return Reconciliation::new(ReconcileOutcome::Ignored);
        }

        let view = navigation.view_mut();
        let from_view = if view.is_showing(&source) {
            view.remove(&RecordMatcher::best(event.id, &name))
                .or_else(|| view.remove(&RecordMatcher::Name(name.clone())))
        } else {
            None
        };
        let mut visible_changed = from_view.is_some();

        let moved = store.move_document(&source, &target, &name, event.hint.or(from_view));
        if view.is_showing(&target) && !view.contains_name(&name) {
            view.append(moved.record);
            visible_changed = true;
        }

        invalidation.mark_stale(&target);
        dedup.note_move(&name);
        Reconciliation::new(ReconcileOutcome::Applied).visible(visible_changed)
    }

    fn apply_add(&self, state: &mut EngineState, event: ResolvedEvent) -> Reconciliation {
        let EngineState {
            store,
            invalidation,
            dedup,
            navigation,
            ..
        } = state;

        let Some(target) = event.target.clone() else {
            return Reconciliation::new(ReconcileOutcome::Ambiguous);
        };
        if !admit(dedup, &event) {
            return Reconciliation::new(ReconcileOutcome::Duplicate);
        }
        let view = navigation.view_mut();
        if !view.is_showing(&target) {
            invalidation.mark_stale(&target);
            return Reconciliation::new(ReconcileOutcome::Deferred);
        }
        let Some(name) = event.name.clone() else {
            invalidation.mark_stale(&target);
            return Reconciliation::new(ReconcileOutcome::Ambiguous)
                .then(self.refetch(&target, self.config.add_refetch_delay));
        };

        let known_id = |id: DocumentId| {
            view.documents().iter().any(|r| r.id == id)
                || store.find_best_known(&name, None).is_some_and(|r| r.id == id)
        };
        let genuine_id = event
            .id
            .filter(|id| !id.is_temporary() && !known_id(*id));
        if dedup.recently_moved(&name)
            && genuine_id.is_none()
            && !dedup.is_expected_upload(&target, &name)
        {
            tracing::debug!(folder = %target, name = %name, "Dropping add echo of recent move");
            return Reconciliation::new(ReconcileOutcome::EchoDropped);
        }
        if view.contains_name(&name) {
            return Reconciliation::new(ReconcileOutcome::Ignored);
        }

        let record = match (event.hint, event.id) {
            (Some(hint), _) => hint.relocated(&target),
            (None, Some(id)) => DocumentRecord::new(id, name, target.clone()),
            (None, None) => store.placeholder(&name, &target),
        };
        view.prepend(record.clone());
        store.upsert_front(&target, record);

        Reconciliation::new(ReconcileOutcome::Applied)
            .visible(true)
            .then(self.refetch(&target, self.config.add_refetch_delay))
    }

    fn apply_delete(&self, state: &mut EngineState, event: ResolvedEvent) -> Reconciliation {
        let EngineState {
            store,
            invalidation,
            dedup,
            navigation,
            ..
        } = state;

        let Some(folder) = event.source.clone().or_else(|| event.target.clone()) else {
            return Reconciliation::new(ReconcileOutcome::Ambiguous);
        };
        if !admit(dedup, &event) {
            return Reconciliation::new(ReconcileOutcome::Duplicate);
        }
        let matchers: Vec<RecordMatcher> = [
            event.id.map(RecordMatcher::Id),
            event.name.clone().map(RecordMatcher::Name),
        ]
        .into_iter()
        .flatten()
        .collect();
        if matchers.is_empty() {
            invalidation.mark_stale(&folder);
            return Reconciliation::new(ReconcileOutcome::Ambiguous);
        }

        let from_store = matchers.iter().find_map(|m| store.remove(&folder, m));
        let view = navigation.view_mut();
        let from_view = if view.is_showing(&folder) {
            matchers.iter().find_map(|m| view.remove(m))
        } else {
            None
        };

        if from_store.is_none() && from_view.is_none() {
            return Reconciliation::new(ReconcileOutcome::Ignored);
        }
        Reconciliation::new(ReconcileOutcome::Applied).visible(from_view.is_some())
    }

    fn apply_restore(&self, state: &mut EngineState, event: ResolvedEvent) -> Reconciliation {
        let EngineState {
            store,
            invalidation,
            dedup,
            navigation,
            ..
        } = state;

        let Some(folder) = event.target.clone().or_else(|| event.source.clone()) else {
            return Reconciliation::new(ReconcileOutcome::Ambiguous);
        };
        if !admit(dedup, &event) {
            return Reconciliation::new(ReconcileOutcome::Duplicate);
        }

        let record = match (event.hint, event.name) {
            (Some(hint), _) => {
                let mut record = hint.relocated(&folder);
                record.deleted = false;
                record
            }
            (None, Some(name)) => {
                let id = event
                    .id
                    .unwrap_or_else(|| store.allocate_temporary_id());
                DocumentRecord::new(id, name, folder.clone())
            }
            (None, None) => {
                invalidation.mark_stale(&folder);
                return Reconciliation::new(ReconcileOutcome::Ambiguous);
            }
        };

        let upserted = store.upsert(&folder, record.clone());
        let view = navigation.view_mut();
        let visible_changed = view.is_showing(&folder) && !view.contains_name(&record.name);
        if visible_changed {
            view.append(record);
        }

        if upserted == Upserted::NoEntry && !visible_changed {
            return Reconciliation::new(ReconcileOutcome::Ignored);
        }
        Reconciliation::new(ReconcileOutcome::Applied).visible(visible_changed)
    }

    fn apply_folder_change(
        &self,
        state: &mut EngineState,
        change: FolderChange,
        event: ResolvedEvent,
    ) -> Reconciliation {
        let EngineState {
            store,
            invalidation,
            dedup,
            navigation,
            ..
        } = state;
        let delay = self.config.structural_refetch_delay;

        if event.source.is_none() && event.target.is_none() {
            store.invalidate_tree();
            return Reconciliation::new(ReconcileOutcome::Ambiguous)
                .then(FollowUp::RefetchTree { delay });
        }
        if !admit(dedup, &event) {
            return Reconciliation::new(ReconcileOutcome::Duplicate);
        }

        let view = navigation.view_mut();
        let mut current_gone = false;
        let mut visible_changed = false;
        match change {
            FolderChange::Created => {}
            FolderChange::Removed => {
                let removed = event.source.as_ref().or(event.target.as_ref());
                if let Some(folder) = removed.filter(|f| !f.is_root()) {
                    let dropped = store.remove_folder(folder);
                    tracing::debug!(folder = %folder, entries = dropped, "Dropped removed folder");
                    if view.folder().is_some_and(|current| current.is_within(folder)) {
                        view.mark_removed();
                        current_gone = true;
                        visible_changed = true;
                    }
                }
            }
            FolderChange::Moved => {
                if let (Some(from), Some(to)) = (&event.source, &event.target) {
                    if !from.is_root() && from != to {
                        let rekeyed = store.rebase_folder(from, to);
                        tracing::debug!(from = %from, to = %to, entries = rekeyed, "Rebased moved folder");
                        if let Some(current) = view.folder().and_then(|c| c.rebase(from, to)) {
                            view.retarget(current);
                            visible_changed = true;
                        }
                    }
                }
            }
        }

        store.invalidate_tree();
        let mut result = Reconciliation::new(ReconcileOutcome::Applied)
            .visible(visible_changed)
            .then(FollowUp::RefetchTree { delay });
        if !current_gone {
            if let Some(current) = view.folder().cloned() {
                invalidation.mark_stale(&current);
                result = result.then(self.refetch(&current, delay));
            }
        }
        result
    }

    fn apply_rename(
        &self,
        state: &mut EngineState,
        folder: &FolderPathKey,
        from: &str,
        to: &str,
    ) -> Reconciliation {
        let in_store = state.store.rename(folder, from, to);
        let view = state.navigation.view_mut();
        let in_view = view.is_showing(folder) && view.rename(from, to);
        if !in_store && !in_view {
            state.invalidation.mark_stale(folder);
            return Reconciliation::new(ReconcileOutcome::Deferred);
        }
        Reconciliation::new(ReconcileOutcome::Applied).visible(in_view)
    }

    fn apply_upload(
        &self,
        state: &mut EngineState,
        folder: &FolderPathKey,
        name: &str,
        record: Option<DocumentRecord>,
    ) -> Reconciliation {
        state.dedup.note_upload(folder, name);
        let Some(record) = record else {
            return Reconciliation::new(ReconcileOutcome::Deferred);
        };
        let record = record.relocated(folder);
        state.store.upsert_front(folder, record.clone());

        let view = state.navigation.view_mut();
        let visible_changed = view.is_showing(folder) && !view.contains_name(&record.name);
        if visible_changed {
            view.prepend(record);
        }
        Reconciliation::new(ReconcileOutcome::Applied).visible(visible_changed)
    }

    fn refetch(&self, folder: &FolderPathKey, delay: Duration) -> FollowUp {
        FollowUp::RefetchDocuments {
            folder: folder.clone(),
            delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn key(raw: &str) -> FolderPathKey {
        FolderPathKey::parse(raw)
    }

    fn full(id: i64, name: &str, folder: &str) -> DocumentRecord {
        DocumentRecord::new(DocumentId::new(id), name, key(folder))
            .with_type("pdf")
            .with_uploaded_at(Utc::now())
    }

    fn setup(current: &str) -> (MutationReconciler, EngineState) {
        let config = EngineConfig::default();
        let mut state = EngineState::new(&config);
        state.store.set(key("a"), vec![full(1, "report.pdf", "a"), full(2, "notes.txt", "a")]);
        state.store.set(key("b"), vec![full(3, "plan.pdf", "b")]);
        let docs = state.store.get(&key(current)).unwrap().documents.clone();
        state.navigation.view_mut().show(key(current), docs);
        (MutationReconciler::new(config), state)
    }

    fn socket(kind: EventKind) -> MutationEvent {
        MutationEvent::new(kind, OriginChannel::Socket)
    }

    #[test]
    fn test_resolve_derives_name_and_folders() {
        let reconciler = MutationReconciler::new(EngineConfig::default());
        let event = socket(EventKind::Move)
            .from_path(r"C:\srv\uploads\A\Report.pdf")
            .to_path("/srv/uploads/B/");
        let resolved = reconciler.resolve(&event);
        assert_eq!(resolved.source, Some(key("a")));
        assert_eq!(resolved.target, Some(key("b")));
        assert_eq!(resolved.name.as_deref(), Some("Report.pdf"));

        let add = reconciler.resolve(&socket(EventKind::Add).to_path("inbox/Scan.PDF"));
        assert_eq!(add.name.as_deref(), Some("Scan.PDF"));
        assert_eq!(add.target, Some(key("inbox")));

        let folder = reconciler.resolve(
            &socket(EventKind::FolderStructural(FolderChange::Created)).to_path("Reports/v1.2"),
        );
        assert_eq!(folder.target, Some(FolderPathKey::root().join("reports").join("v1.2")));
        assert!(folder.name.is_none());
    }

    #[test]
    fn test_move_out_of_visible_folder() {
        let (reconciler, mut state) = setup("a");
        let event = socket(EventKind::Move).from_path("a/report.pdf").to_path("b");

        let result = reconciler.apply(&mut state, &event);
        assert!(result.is_applied());
        assert!(result.visible_changed);
        assert!(result.follow_ups.is_empty());
        assert_eq!(state.navigation.snapshot().names(), vec!["notes.txt"]);
        assert!(state.store.get(&key("b")).unwrap().contains_name("report.pdf"));
        assert!(!state.store.get(&key("a")).unwrap().contains_name("report.pdf"));
        assert!(state.invalidation.peek(&key("b")));
        assert!(state.dedup.recently_moved("report.pdf"));
    }

    #[test]
    fn test_move_into_visible_folder_appends() {
        let (reconciler, mut state) = setup("b");
        let event = socket(EventKind::Move).from_path("a/report.pdf").to_path("b/report.pdf");

        let result = reconciler.apply(&mut state, &event);
        assert!(result.visible_changed);
        let snapshot = state.navigation.snapshot();
        assert_eq!(snapshot.names(), vec!["plan.pdf", "report.pdf"]);
        assert_eq!(snapshot.documents[1].id, DocumentId::new(1));
        assert_eq!(snapshot.documents[1].folder, key("b"));
    }

    #[test]
    fn test_move_without_name_marks_both_stale() {
        let (reconciler, mut state) = setup("a");
        let event = socket(EventKind::Move).from_path("a/").to_path("b/");

        let result = reconciler.apply(&mut state, &event);
        assert_eq!(result.outcome, ReconcileOutcome::Ambiguous);
        assert!(state.invalidation.peek(&key("a")));
        assert!(state.invalidation.peek(&key("b")));
        assert_eq!(state.navigation.snapshot().documents.len(), 2);
    }

    #[test]
    fn test_duplicate_move_is_rejected() {
        let (reconciler, mut state) = setup("a");
        let event = socket(EventKind::Move).from_path("a/report.pdf").to_path("b");
        reconciler.apply(&mut state, &event);

        let signal = MutationEvent::new(EventKind::Move, OriginChannel::Signal)
            .from_path("/srv/uploads/A/Report.pdf")
            .to_path("/srv/uploads/B/Report.pdf");
        let result = reconciler.apply(&mut state, &signal);
        assert_eq!(result.outcome, ReconcileOutcome::Duplicate);
        assert_eq!(state.store.get(&key("b")).unwrap().documents.len(), 2);
    }

    #[test]
    fn test_add_to_hidden_folder_only_marks_stale() {
        let (reconciler, mut state) = setup("a");
        let result = reconciler.apply(&mut state, &socket(EventKind::Add).to_path("b/new.pdf"));
        assert_eq!(result.outcome, ReconcileOutcome::Deferred);
        assert!(state.invalidation.peek(&key("b")));
        assert_eq!(state.store.get(&key("b")).unwrap().documents.len(), 1);
    }

    #[test]
    fn test_add_to_visible_folder_prepends_placeholder() {
        let (reconciler, mut state) = setup("a");
        let result = reconciler.apply(&mut state, &socket(EventKind::Add).to_path("a/new.pdf"));

        assert!(result.is_applied());
        assert_eq!(
            result.follow_ups,
            vec![FollowUp::RefetchDocuments {
                folder: key("a"),
                delay: Duration::from_millis(750),
            }]
        );
        let snapshot = state.navigation.snapshot();
        assert_eq!(snapshot.names()[0], "new.pdf");
        assert!(snapshot.documents[0].is_placeholder());
        assert!(state.store.get(&key("a")).unwrap().has_placeholder());
    }

    #[test]
    fn test_add_uses_event_id() {
        let (reconciler, mut state) = setup("a");
        let event = socket(EventKind::Add)
            .to_path("a/new.pdf")
            .with_id(DocumentId::new(99));
        reconciler.apply(&mut state, &event);
        assert_eq!(state.navigation.snapshot().documents[0].id, DocumentId::new(99));
    }

    #[test]
    fn test_add_of_listed_name_is_ignored() {
        let (reconciler, mut state) = setup("a");
        let result = reconciler.apply(&mut state, &socket(EventKind::Add).to_path("a/Report.PDF"));
        assert_eq!(result.outcome, ReconcileOutcome::Ignored);
        assert_eq!(state.navigation.snapshot().documents.len(), 2);
    }

    #[test]
    fn test_add_echo_of_move_is_dropped() {
        let (reconciler, mut state) = setup("a");
        state.dedup.note_move("scan.pdf");
        let result = reconciler.apply(&mut state, &socket(EventKind::Add).to_path("a/scan.pdf"));
        assert_eq!(result.outcome, ReconcileOutcome::EchoDropped);
        assert_eq!(state.navigation.snapshot().documents.len(), 2);
    }

    #[test]
    fn test_add_after_move_with_announced_upload_is_kept() {
        let (reconciler, mut state) = setup("a");
        state.dedup.note_move("scan.pdf");
        reconciler.apply_local(
            &mut state,
            &LocalMutation::Upload {
                folder: key("a"),
                name: "scan.pdf".to_string(),
                record: None,
            },
        );
        let result = reconciler.apply(&mut state, &socket(EventKind::Add).to_path("a/scan.pdf"));
        assert!(result.is_applied());
    }

    #[test]
    fn test_add_after_move_with_new_id_is_kept() {
        let (reconciler, mut state) = setup("a");
        state.dedup.note_move("scan.pdf");
        let event = socket(EventKind::Add)
            .to_path("a/scan.pdf")
            .with_id(DocumentId::new(500));
        assert!(reconciler.apply(&mut state, &event).is_applied());
    }

    #[test]
    fn test_delete_and_restore() {
        let (reconciler, mut state) = setup("a");
        let delete = socket(EventKind::Delete)
            .from_path("a/notes.txt")
            .with_id(DocumentId::new(2));
        let result = reconciler.apply(&mut state, &delete);
        assert!(result.is_applied());
        assert!(result.follow_ups.is_empty());
        assert_eq!(state.navigation.snapshot().names(), vec!["report.pdf"]);
        assert!(!state.store.get(&key("a")).unwrap().contains_name("notes.txt"));

        let restore = socket(EventKind::Restore)
            .to_path("a")
            .with_hint(full(2, "notes.txt", "trash"));
        let result = reconciler.apply(&mut state, &restore);
        assert!(result.is_applied());
        assert_eq!(state.navigation.snapshot().names(), vec!["report.pdf", "notes.txt"]);
        let restored = state.store.get(&key("a")).unwrap().find_by_name("notes.txt").unwrap().clone();
        assert_eq!(restored.id, DocumentId::new(2));
        assert_eq!(restored.folder, key("a"));
    }

    #[test]
    fn test_delete_of_unknown_record_is_ignored() {
        let (reconciler, mut state) = setup("a");
        let result = reconciler.apply(&mut state, &socket(EventKind::Delete).from_path("a/missing.pdf"));
        assert_eq!(result.outcome, ReconcileOutcome::Ignored);
    }

    #[test]
    fn test_local_delete_suppresses_socket_echo() {
        let (reconciler, mut state) = setup("a");
        let local = LocalMutation::Delete {
            folder: key("a"),
            name: "notes.txt".to_string(),
            id: Some(DocumentId::new(2)),
        };
        assert!(reconciler.apply_local(&mut state, &local).is_applied());

        let echo = socket(EventKind::Delete).from_path("/srv/uploads/a/notes.txt");
        assert_eq!(
            reconciler.apply(&mut state, &echo).outcome,
            ReconcileOutcome::Suppressed
        );
    }

    #[test]
    fn test_confirmed_moves_back_and_forth_all_apply() {
        let (reconciler, mut state) = setup("a");
        let hop = |from: &str, to: &str| LocalMutation::Move {
            source: key(from),
            target: key(to),
            name: "report.pdf".to_string(),
            record: None,
        };

        for (from, to) in [("a", "b"), ("b", "a"), ("a", "b")] {
            let result = reconciler.apply_local(&mut state, &hop(from, to));
            assert_eq!(result.outcome, ReconcileOutcome::Applied, "{from} -> {to}");
        }
        assert_eq!(state.navigation.snapshot().names(), vec!["notes.txt"]);
        assert!(!state.store.get(&key("a")).unwrap().contains_name("report.pdf"));
        assert!(state.store.get(&key("b")).unwrap().contains_name("report.pdf"));
    }

    #[test]
    fn test_confirmed_delete_after_restore_applies() {
        let (reconciler, mut state) = setup("a");
        let delete = LocalMutation::Delete {
            folder: key("a"),
            name: "notes.txt".to_string(),
            id: Some(DocumentId::new(2)),
        };
        let restore = LocalMutation::Restore {
            folder: key("a"),
            name: "notes.txt".to_string(),
            record: Some(full(2, "notes.txt", "a")),
        };

        for mutation in [&delete, &restore, &delete] {
            assert!(reconciler.apply_local(&mut state, mutation).is_applied());
        }
        assert_eq!(state.navigation.snapshot().names(), vec!["report.pdf"]);
        assert!(!state.store.get(&key("a")).unwrap().contains_name("notes.txt"));
    }

    #[test]
    fn test_unnamed_adds_are_never_deduplicated() {
        let (reconciler, mut state) = setup("a");
        for _ in 0..2 {
            let result = reconciler.apply(&mut state, &socket(EventKind::Add).to_path("a/"));
            assert_eq!(result.outcome, ReconcileOutcome::Ambiguous);
            assert_eq!(result.follow_ups.len(), 1);
            assert!(state.invalidation.is_stale(&key("a")));
        }
        assert_eq!(state.dedup.tracked(), 0);
    }

    #[test]
    fn test_folder_removal_drops_subtree() {
        let (reconciler, mut state) = setup("a");
        state.store.set(key("b/deep"), vec![]);
        state.store.set(key("bb"), vec![]);
        let event = socket(EventKind::FolderStructural(FolderChange::Removed)).from_path("b");

        let result = reconciler.apply(&mut state, &event);
        assert!(result.is_applied());
        assert!(!state.store.contains(&key("b")));
        assert!(!state.store.contains(&key("b/deep")));
        assert!(state.store.contains(&key("bb")));
        assert!(state.store.tree_is_stale());
        assert!(state.invalidation.peek(&key("a")));
        assert_eq!(result.follow_ups.len(), 2);
    }

    #[test]
    fn test_removal_of_visible_folder() {
        let (reconciler, mut state) = setup("b");
        let event = socket(EventKind::FolderStructural(FolderChange::Removed)).from_path("b");
        let result = reconciler.apply(&mut state, &event);
        assert_eq!(result.follow_ups, vec![FollowUp::RefetchTree { delay: Duration::ZERO }]);
        assert_eq!(state.navigation.view().status(), &crate::view::ViewStatus::Removed);
    }

    #[test]
    fn test_local_folder_move_retargets_view() {
        let (reconciler, mut state) = setup("a");
        let local = LocalMutation::MoveFolder {
            from: key("a"),
            to: key("archive/a"),
        };
        let result = reconciler.apply_local(&mut state, &local);
        assert!(result.is_applied());
        assert_eq!(state.navigation.current_folder(), Some(&key("archive/a")));
        assert!(state.store.contains(&key("archive/a")));
        assert!(state.invalidation.peek(&key("archive/a")));

        let echo = socket(EventKind::FolderStructural(FolderChange::Moved))
            .from_path("a")
            .to_path("archive/a");
        assert_eq!(
            reconciler.apply(&mut state, &echo).outcome,
            ReconcileOutcome::Suppressed
        );
    }

    #[test]
    fn test_local_rename() {
        let (reconciler, mut state) = setup("a");
        let local = LocalMutation::Rename {
            folder: key("a"),
            from: "notes.txt".to_string(),
            to: "minutes.txt".to_string(),
        };
        let result = reconciler.apply_local(&mut state, &local);
        assert!(result.visible_changed);
        assert_eq!(state.navigation.snapshot().names(), vec!["report.pdf", "minutes.txt"]);
        let renamed = state.store.get(&key("a")).unwrap().find_by_name("minutes.txt").unwrap().clone();
        assert_eq!(renamed.id, DocumentId::new(2));
        assert!(renamed.uploaded_at.is_some());
    }
}
