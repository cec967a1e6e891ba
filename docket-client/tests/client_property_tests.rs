use docket_cache::MutationReconciler;
use docket_client::adapters::EventAdapter;
use docket_client::config::ReconnectConfig;
use docket_client::events::PushEvent;
use docket_client::realtime::Backoff;
use docket_core::{EngineConfig, EventKind, FolderPathKey, OriginChannel};
use docket_test_utils::generators::*;
use proptest::prelude::*;

fn no_marker(folder: &str) -> bool {
    !folder
        .split('/')
        .any(|segment| segment.trim().eq_ignore_ascii_case("uploads"))
}

proptest! {
    #[test]
    fn delete_paths_resolve_to_same_folder_in_every_encoding(
        (folder, encoded) in arb_folder_path()
            .prop_filter("no root marker segment", |f| no_marker(f))
            .prop_flat_map(|folder| (Just(folder.clone()), arb_absolute_path(folder))),
        name in arb_document_name(),
        origin in arb_external_origin(),
    ) {
        let adapter = EventAdapter::default();
        let reconciler = MutationReconciler::new(EngineConfig::default());
        let path = format!("{}/{}", encoded.trim_end_matches('/'), name);

        let mutation = adapter
            .to_mutation(&PushEvent::new("delete").with_source(path), origin)
            .unwrap();
        prop_assert_eq!(mutation.kind, EventKind::Delete);
        prop_assert_eq!(mutation.document_name.as_deref(), Some(name.as_str()));

        let resolved = reconciler.resolve(&mutation);
        prop_assert_eq!(resolved.source, Some(FolderPathKey::parse(&folder)));
        prop_assert_eq!(resolved.name, Some(name));
    }

    #[test]
    fn move_to_folder_keeps_target_folder(
        source in arb_folder_path().prop_filter("no root marker segment", |f| no_marker(f)),
        target in arb_folder_path().prop_filter("no root marker segment", |f| no_marker(f)),
        name in arb_document_name(),
        id in 1i64..1_000_000,
    ) {
        let adapter = EventAdapter::default();
        let reconciler = MutationReconciler::new(EngineConfig::default());
        let event = PushEvent::new("move")
            .with_source(format!("/srv/uploads/{}/{}", source, name))
            .with_target_folder(target.clone())
            .with_id(id);

        let mutation = adapter.to_mutation(&event, OriginChannel::Socket).unwrap();
        let resolved = reconciler.resolve(&mutation);
        prop_assert_eq!(resolved.source, Some(FolderPathKey::parse(&source)));
        prop_assert_eq!(resolved.target, Some(FolderPathKey::parse(&target)));
        prop_assert_eq!(resolved.id.map(|id| id.as_i64()), Some(id));
    }

    #[test]
    fn backoff_is_monotonic_and_capped(
        initial_ms in 1u64..1_000,
        extra_ms in 0u64..10_000,
        multiplier in 1.0f64..4.0,
        attempts in 1usize..30,
    ) {
        let max_ms = initial_ms + extra_ms;
        let mut backoff = Backoff::new(ReconnectConfig {
            initial_ms,
            max_ms,
            multiplier,
            jitter_ms: 0,
        });
        let mut previous = 0u64;
        for _ in 0..attempts {
            let delay = backoff.next_delay().as_millis() as u64;
            prop_assert!(delay >= previous);
            prop_assert!(delay <= max_ms);
            previous = delay;
        }
    }
}
