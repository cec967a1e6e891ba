use async_trait::async_trait;
use docket_cache::{CacheService, ReconcileOutcome};
use docket_client::actions::{DocumentMutations, LocalActions};
use docket_client::api_client::ApiClientError;
use docket_client::events::{ClientEvent, PushEvent};
use docket_client::{ClientError, EventAdapter, EventPump};
use docket_core::{DocumentId, DocumentRecord, FolderPathKey, OriginChannel};
use docket_test_utils::assertions::assert_names;
use docket_test_utils::fixtures::*;
use docket_test_utils::MockSource;
use std::sync::Mutex;
use std::time::Duration;

/// Records calls and answers with canned results.
#[derive(Default)]
struct FakeApi {
    calls: Mutex<Vec<String>>,
    reject: Mutex<bool>,
}

impl FakeApi {
    fn rejecting() -> Self {
        Self {
            calls: Mutex::default(),
            reject: Mutex::new(true),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call(&self, what: String) -> Result<(), ApiClientError> {
        self.calls.lock().unwrap().push(what);
        if *self.reject.lock().unwrap() {
            return Err(ApiClientError::Status {
                status: 409,
                message: "conflict".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentMutations for FakeApi {
    async fn move_document(
        &self,
        source: &FolderPathKey,
        name: &str,
        target: &FolderPathKey,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        self.call(format!("move {}/{} -> {}", source, name, target))?;
        Ok(Some(record(1, name, target.as_str())))
    }

    async fn move_folder(
        &self,
        from: &FolderPathKey,
        to: &FolderPathKey,
    ) -> Result<(), ApiClientError> {
        self.call(format!("move_folder {} -> {}", from, to))
    }

    async fn delete_document(
        &self,
        folder: &FolderPathKey,
        name: &str,
    ) -> Result<(), ApiClientError> {
        self.call(format!("delete {}/{}", folder, name))
    }

    async fn restore_item(
        &self,
        id: DocumentId,
        target: &FolderPathKey,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        self.call(format!("restore {} -> {}", id, target))?;
        Ok(Some(record(id.as_i64(), "notes.txt", target.as_str())))
    }

    async fn rename_document(
        &self,
        folder: &FolderPathKey,
        name: &str,
        new_name: &str,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        self.call(format!("rename {}/{} -> {}", folder, name, new_name))?;
        Ok(None)
    }

    async fn upload(
        &self,
        folder: &FolderPathKey,
        name: &str,
        _contents: Vec<u8>,
    ) -> Result<Option<DocumentRecord>, ApiClientError> {
        self.call(format!("upload {}/{}", folder, name))?;
        Ok(Some(record(50, name, folder.as_str())))
    }

    async fn create_folder(&self, folder: &FolderPathKey) -> Result<(), ApiClientError> {
        self.call(format!("create_folder {}", folder))
    }

    async fn remove_folder(&self, folder: &FolderPathKey) -> Result<(), ApiClientError> {
        self.call(format!("remove_folder {}", folder))
    }
}

fn service() -> CacheService<MockSource> {
    let source = MockSource::new()
        .with_listing("a", vec![record(1, "report.pdf", "a"), record(2, "notes.txt", "a")])
        .with_listing("b", vec![record(3, "plan.pdf", "b")]);
    CacheService::new(source, fast_config())
}

fn remote(event: PushEvent) -> ClientEvent {
    ClientEvent::Remote {
        origin: OriginChannel::Socket,
        event: Box::new(event),
    }
}

#[tokio::test(start_paused = true)]
async fn confirmed_move_updates_view_and_suppresses_echo() {
    let service = service();
    service.enter_folder(folder("a")).await.unwrap();
    let actions = LocalActions::new(service.clone(), FakeApi::default());

    let result = actions
        .move_document(&folder("a"), "report.pdf", &folder("b"))
        .await
        .unwrap();
    assert!(result.is_applied());
    assert_names(&service.snapshot().unwrap().documents, &["notes.txt"]);
    assert_eq!(actions.api().calls(), vec!["move a/report.pdf -> b".to_string()]);

    let mut pump = EventPump::new(service.clone(), EventAdapter::default());
    let echo = pump
        .handle(remote(
            PushEvent::new("move")
                .with_source("/srv/uploads/A/report.pdf")
                .with_target_folder("B"),
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echo.outcome, ReconcileOutcome::Suppressed);
}

#[tokio::test(start_paused = true)]
async fn rejected_action_leaves_engine_untouched() {
    let service = service();
    service.enter_folder(folder("a")).await.unwrap();
    let actions = LocalActions::new(service.clone(), FakeApi::rejecting());

    let err = actions
        .delete_document(&folder("a"), "notes.txt", Some(DocumentId::new(2)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Api(ApiClientError::Status { status: 409, .. })
    ));
    assert_names(&service.snapshot().unwrap().documents, &["report.pdf", "notes.txt"]);

    // No suppression was registered, so the socket's delete applies.
    let mut pump = EventPump::new(service.clone(), EventAdapter::default());
    let applied = pump
        .handle(remote(PushEvent::new("delete").with_source("a/notes.txt")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(applied.outcome, ReconcileOutcome::Applied);
}

#[tokio::test(start_paused = true)]
async fn delete_then_restore_returns_record_to_view() {
    let service = service();
    service.enter_folder(folder("a")).await.unwrap();
    let actions = LocalActions::new(service.clone(), FakeApi::default());

    actions
        .delete_document(&folder("a"), "notes.txt", Some(DocumentId::new(2)))
        .await
        .unwrap();
    assert_names(&service.snapshot().unwrap().documents, &["report.pdf"]);

    tokio::time::advance(Duration::from_secs(4)).await;
    let restored = actions
        .restore(DocumentId::new(2), "notes.txt", &folder("a"))
        .await
        .unwrap();
    assert!(restored.is_applied());
    let snapshot = service.snapshot().unwrap();
    assert!(snapshot.documents.iter().any(|r| r.id == DocumentId::new(2)));
}

#[tokio::test(start_paused = true)]
async fn rename_keeps_metadata() {
    let service = service();
    service.enter_folder(folder("a")).await.unwrap();
    let actions = LocalActions::new(service.clone(), FakeApi::default());

    actions
        .rename(&folder("a"), "report.pdf", "summary.pdf")
        .await
        .unwrap();
    let snapshot = service.snapshot().unwrap();
    assert_names(&snapshot.documents, &["summary.pdf", "notes.txt"]);
    assert_eq!(snapshot.documents[0].id, DocumentId::new(1));
    assert_eq!(snapshot.documents[0].tags, vec!["fixture".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn upload_add_event_is_not_treated_as_move_echo() {
    let service = service();
    service.enter_folder(folder("b")).await.unwrap();
    service.enter_folder(folder("a")).await.unwrap();
    let actions = LocalActions::new(service.clone(), FakeApi::default());

    // report.pdf leaves, then a file of the same name is uploaded back.
    actions
        .move_document(&folder("a"), "report.pdf", &folder("b"))
        .await
        .unwrap();
    tokio::time::advance(Duration::from_millis(2_500)).await;
    let uploaded = actions
        .upload(&folder("a"), "report.pdf", b"%PDF".to_vec())
        .await
        .unwrap();
    assert!(uploaded.is_applied());
    assert_eq!(service.snapshot().unwrap().documents[0].id, DocumentId::new(50));

    let mut pump = EventPump::new(service.clone(), EventAdapter::default());
    let add = pump
        .handle(remote(PushEvent::new("add").with_target("a/report.pdf")))
        .await
        .unwrap()
        .unwrap();
    assert_ne!(add.outcome, ReconcileOutcome::EchoDropped);
    let copies = service
        .snapshot()
        .unwrap()
        .documents
        .iter()
        .filter(|r| r.matches_name("report.pdf"))
        .count();
    assert_eq!(copies, 1);
}

#[tokio::test(start_paused = true)]
async fn folder_actions_reach_engine() {
    let service = service();
    service.enter_folder(folder("b")).await.unwrap();
    service.enter_folder(folder("a")).await.unwrap();
    let actions = LocalActions::new(service.clone(), FakeApi::default());

    let created = actions.create_folder(&folder("a/new")).await.unwrap();
    assert!(created.is_applied());
    let moved = actions
        .move_folder(&folder("b"), &folder("a/b"))
        .await
        .unwrap();
    assert!(moved.is_applied());
    assert!(service.cached(&folder("b")).unwrap().is_none());
    assert!(service.cached(&folder("a/b")).unwrap().is_some());
    assert_eq!(
        actions.api().calls(),
        vec![
            "create_folder a/new".to_string(),
            "move_folder b -> a/b".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn pump_drops_malformed_events() {
    let service = service();
    let mut pump = EventPump::new(service, EventAdapter::default());
    let result = pump
        .handle(remote(PushEvent::new("heartbeat")))
        .await
        .unwrap();
    assert!(result.is_none());

    let result = pump
        .handle(remote(PushEvent::new("move").with_source("a/x.pdf")))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test(start_paused = true)]
async fn reconnect_refreshes_current_folder() {
    let service = service();
    service.enter_folder(folder("a")).await.unwrap();
    let mut pump = EventPump::new(service.clone(), EventAdapter::default());

    pump.handle(ClientEvent::Connected).await.unwrap();
    assert_eq!(service.source().fetches_of("a"), 1);

    pump.handle(ClientEvent::Disconnected {
        reason: "reset".to_string(),
    })
    .await
    .unwrap();
    service
        .source()
        .set_listing("a", vec![record(2, "notes.txt", "a")]);
    pump.handle(ClientEvent::Connected).await.unwrap();

    assert_eq!(service.source().fetches_of("a"), 2);
    assert_eq!(service.source().tree_fetches(), 1);
    assert_names(&service.snapshot().unwrap().documents, &["notes.txt"]);
}
