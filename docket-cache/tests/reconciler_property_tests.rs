use docket_cache::{EngineState, EventDeduplicator, MutationReconciler, ReconcileOutcome};
use docket_core::{
    document_path, DocumentRecord, EngineConfig, EventKind, FolderPathKey, MutationEvent,
    OriginChannel, PathNormalizer,
};
use docket_test_utils::assertions::assert_unique_names;
use docket_test_utils::generators::*;
use proptest::prelude::*;

fn seeded_state(
    config: &EngineConfig,
    source: &FolderPathKey,
    source_docs: Vec<DocumentRecord>,
    target: &FolderPathKey,
    target_docs: Vec<DocumentRecord>,
) -> EngineState {
    let mut state = EngineState::new(config);
    state.store.set(source.clone(), source_docs.clone());
    state.store.set(target.clone(), target_docs);
    state.navigation.view_mut().show(source.clone(), source_docs);
    state
}

fn listing_ids(state: &EngineState, folder: &FolderPathKey) -> Vec<(String, i64)> {
    state
        .store
        .get(folder)
        .map(|entry| {
            entry
                .documents
                .iter()
                .map(|r| (r.name.to_lowercase(), r.id.as_i64()))
                .collect()
        })
        .unwrap_or_default()
}

fn plain_folder() -> impl Strategy<Value = FolderPathKey> {
    arb_folder_key().prop_filter("no root marker segment", |key| {
        !key.is_root() && !key.as_str().split('/').any(|s| s == "uploads")
    })
}

fn two_folders() -> impl Strategy<Value = (FolderPathKey, FolderPathKey)> {
    (plain_folder(), plain_folder()).prop_filter("distinct folders", |(a, b)| a != b)
}

proptest! {
    #[test]
    fn move_applied_twice_equals_move_applied_once(
        (source, target) in two_folders(),
        source_docs in arb_listing(FolderPathKey::parse("src")).prop_filter("non-empty", |d| !d.is_empty()),
        target_docs in arb_listing(FolderPathKey::parse("dst")),
        pick in any::<prop::sample::Index>(),
        origin in arb_external_origin(),
    ) {
        let config = EngineConfig::default();
        let reconciler = MutationReconciler::new(config.clone());
        let moved = pick.get(&source_docs).name.clone();
        let event = MutationEvent::new(EventKind::Move, origin)
            .from_path(document_path(&source, &moved))
            .to_path(target.as_str());

        let mut once = seeded_state(&config, &source, source_docs.clone(), &target, target_docs.clone());
        reconciler.apply(&mut once, &event);

        let mut twice = seeded_state(&config, &source, source_docs, &target, target_docs);
        reconciler.apply(&mut twice, &event);
        twice.dedup = EventDeduplicator::new(config.dedup_ttl, config.upload_window);
        reconciler.apply(&mut twice, &event);

        prop_assert_eq!(listing_ids(&once, &source), listing_ids(&twice, &source));
        prop_assert_eq!(listing_ids(&once, &target), listing_ids(&twice, &target));
        prop_assert_eq!(once.navigation.snapshot().documents, twice.navigation.snapshot().documents);
    }

    #[test]
    fn move_into_folder_listing_the_name_never_duplicates(
        (source, target) in two_folders(),
        record in arb_document_record(FolderPathKey::parse("src")),
        target_docs in arb_listing(FolderPathKey::parse("dst")),
    ) {
        let config = EngineConfig::default();
        let reconciler = MutationReconciler::new(config.clone());
        let mut target_docs: Vec<DocumentRecord> = target_docs
            .into_iter()
            .filter(|r| !r.matches_name(&record.name) && r.id != record.id)
            .collect();
        target_docs.push(record.relocated(&target));

        let mut state = seeded_state(&config, &source, vec![record.clone()], &target, target_docs);
        let event = MutationEvent::new(EventKind::Move, OriginChannel::Socket)
            .from_path(document_path(&source, &record.name))
            .to_path(target.as_str());
        let result = reconciler.apply(&mut state, &event);

        prop_assert_eq!(result.outcome, ReconcileOutcome::Applied);
        let entry = state.store.get(&target).unwrap();
        assert_unique_names(&entry.documents);
        prop_assert_eq!(entry.documents.iter().filter(|r| r.matches_name(&record.name)).count(), 1);
        prop_assert!(state.store.get(&source).unwrap().documents.is_empty());
    }

    #[test]
    fn absolute_and_logical_paths_normalize_equal(
        folder in arb_folder_path(),
        name in arb_document_name(),
    ) {
        let normalizer = PathNormalizer::default();
        let logical = normalizer.normalize(&folder);
        prop_assume!(!logical.as_str().split('/').any(|s| s == "uploads"));
        for encoded in [
            format!("/srv/uploads/{}/{}", folder, name),
            format!("C:\\data\\Uploads\\{}\\{}", folder.replace('/', "\\"), name),
            format!("//srv//uploads//{}//{}", folder, name),
            format!("{}/{}", folder, name),
            format!("/{}/", folder),
        ] {
            prop_assert_eq!(normalizer.normalize(&encoded), logical.clone());
        }
    }

    #[test]
    fn delete_then_restore_returns_record(
        record in arb_document_record(FolderPathKey::parse("a")),
        origin in arb_external_origin(),
    ) {
        let config = EngineConfig::default();
        let reconciler = MutationReconciler::new(config.clone());
        let folder = FolderPathKey::parse("a");
        let mut state = seeded_state(&config, &folder, vec![record.clone()], &FolderPathKey::parse("b"), vec![]);

        let delete = MutationEvent::new(EventKind::Delete, origin)
            .from_path(document_path(&folder, &record.name))
            .with_id(record.id);
        prop_assert!(reconciler.apply(&mut state, &delete).is_applied());
        prop_assert!(state.navigation.snapshot().documents.is_empty());

        let restore = MutationEvent::new(EventKind::Restore, origin)
            .to_path("a")
            .with_hint(record.clone());
        prop_assert!(reconciler.apply(&mut state, &restore).is_applied());
        let snapshot = state.navigation.snapshot();
        prop_assert_eq!(snapshot.documents.len(), 1);
        prop_assert_eq!(snapshot.documents[0].id, record.id);
        prop_assert_eq!(&snapshot.documents[0].tags, &record.tags);
    }
}
