//! Feeds channel events into the engine.

use crate::adapters::EventAdapter;
use crate::events::ClientEvent;
use docket_cache::{CacheService, Reconciliation};
use docket_core::{DocumentSource, EngineError};
use tokio::sync::mpsc;

pub struct EventPump<S> {
    service: CacheService<S>,
    adapter: EventAdapter,
    connected_once: bool,
}

impl<S: DocumentSource> EventPump<S> {
    pub fn new(service: CacheService<S>, adapter: EventAdapter) -> Self {
        Self {
            service,
            adapter,
            connected_once: false,
        }
    }

    pub fn service(&self) -> &CacheService<S> {
        &self.service
    }

    /// Handle one event. Returns the reconciliation for remote changes.
    ///
    /// Malformed payloads are logged and dropped. Only a broken engine is an
    /// error.
    pub async fn handle(&mut self, event: ClientEvent) -> Result<Option<Reconciliation>, EngineError> {
        match event {
            ClientEvent::Remote { origin, event } => {
                match self.adapter.to_mutation(&event, origin) {
                    Ok(mutation) => self.service.dispatch(&mutation).map(Some),
                    Err(err) => {
                        tracing::warn!(origin = %origin, error = %err, "Dropping malformed event");
                        Ok(None)
                    }
                }
            }
            ClientEvent::Connected => {
                // Changes made while disconnected were never pushed.
                if self.connected_once {
                    self.resync().await?;
                }
                self.connected_once = true;
                Ok(None)
            }
            ClientEvent::Disconnected { reason } => {
                tracing::info!(reason = %reason, "Push channel down");
                Ok(None)
            }
            ClientEvent::ChannelError { origin, message } => {
                tracing::warn!(origin = %origin, error = %message, "Channel error");
                Ok(None)
            }
        }
    }

    /// Drain `events` until the channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<ClientEvent>) -> Result<(), EngineError> {
        while let Some(event) = events.recv().await {
            self.handle(event).await?;
        }
        Ok(())
    }

    async fn resync(&self) -> Result<(), EngineError> {
        let Some(folder) = self.service.current_folder()? else {
            return Ok(());
        };
        tracing::info!(folder = %folder, "Resyncing after reconnect");
        match self.service.refresh_folder(&folder).await {
            Ok(()) => {}
            Err(EngineError::Fetch { folder, source }) => {
                tracing::warn!(folder = %folder, error = %source, "Resync fetch failed");
                self.service.mark_stale(&folder)?;
            }
            Err(err) => return Err(err),
        }
        if let Err(err) = self.service.refresh_tree().await {
            tracing::warn!(error = %err, "Folder tree refresh failed");
        }
        Ok(())
    }
}
