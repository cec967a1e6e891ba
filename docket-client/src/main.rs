//! Docket headless client entry point.

use docket_cache::CacheService;
use docket_client::api_client::ApiClient;
use docket_client::config::ClientConfig;
use docket_client::error::ClientError;
use docket_client::events::ClientEvent;
use docket_client::persistence::{self, PersistedState};
use docket_client::{realtime, signals, telemetry, EventAdapter, EventPump};
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = ClientConfig::load()?;
    telemetry::init_tracing(&config.log)?;

    let engine_config = config.engine_config();
    let api = ApiClient::new(&config)?;
    let service = CacheService::new(api.rest().clone(), engine_config.clone());

    let start = match persistence::load(&config.state_path) {
        Ok(Some(state)) => state.last_folder,
        Ok(None) => config.initial_folder_key(),
        Err(err) => {
            tracing::warn!(error = %err, "Ignoring unreadable client state");
            config.initial_folder_key()
        }
    };
    if let Err(err) = service.folder_tree().await {
        tracing::warn!(error = %err, "Initial folder tree fetch failed");
    }
    if let Err(err) = service.enter_folder(start.clone()).await {
        tracing::error!(folder = %start, error = %err, "Initial navigation failed");
    }

    let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(256);
    let ws_task = realtime::spawn_ws_manager(api.ws().clone(), event_tx.clone());
    let signal_task = config.signal_file.clone().map(|path| {
        signals::spawn_signal_watcher(
            path,
            Duration::from_millis(config.signal_poll_ms),
            event_tx.clone(),
        )
    });
    drop(event_tx);

    let mut views = service.subscribe();
    let view_task = tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let snapshot = views.borrow_and_update().clone();
            tracing::info!(
                folder = ?snapshot.folder,
                generation = %snapshot.generation,
                documents = snapshot.documents.len(),
                status = ?snapshot.status,
                "View updated"
            );
        }
    });

    let pump = EventPump::new(service.clone(), EventAdapter::new(engine_config.normalizer()));
    tokio::select! {
        result = pump.run(event_rx) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    ws_task.abort();
    if let Some(task) = signal_task {
        task.abort();
    }
    view_task.abort();

    if let Ok(Some(folder)) = service.current_folder() {
        let persisted = PersistedState {
            last_folder: folder,
        };
        if let Err(err) = persistence::save(&config.state_path, &persisted) {
            tracing::warn!(error = %err, "Failed to save client state");
        }
    }

    Ok(())
}
