//! Push socket manager with reconnect backoff.

use crate::api_client::WsClient;
use crate::config::ReconnectConfig;
use crate::events::{ClientEvent, PushEvent};
use docket_core::OriginChannel;
use futures_util::StreamExt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Exponential reconnect delay, reset after every successful connect.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    current_ms: u64,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let current_ms = config.initial_ms;
        Self { config, current_ms }
    }

    pub fn reset(&mut self) {
        self.current_ms = self.config.initial_ms;
    }

    /// Delay before the next attempt, without jitter.
    pub fn current_ms(&self) -> u64 {
        self.current_ms
    }

    /// Return the jittered delay for this attempt and grow the base.
    pub fn next_delay(&mut self) -> Duration {
        let delay = jittered_backoff(self.current_ms, self.config.jitter_ms);
        let next = (self.current_ms as f64 * self.config.multiplier) as u64;
        self.current_ms = next.min(self.config.max_ms);
        Duration::from_millis(delay)
    }
}

pub fn spawn_ws_manager(ws: WsClient, sender: mpsc::Sender<ClientEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = Backoff::new(ws.reconnect_config().clone());
        loop {
            match ws.connect().await {
                Ok(mut stream) => {
                    tracing::info!("Push socket connected");
                    if sender.send(ClientEvent::Connected).await.is_err() {
                        return;
                    }
                    backoff.reset();

                    let reason = loop {
                        match stream.next().await {
                            Some(Ok(Message::Text(text))) => {
                                let event = match serde_json::from_str::<PushEvent>(&text) {
                                    Ok(event) => ClientEvent::Remote {
                                        origin: OriginChannel::Socket,
                                        event: Box::new(event),
                                    },
                                    Err(err) => ClientEvent::ChannelError {
                                        origin: OriginChannel::Socket,
                                        message: format!("Socket decode error: {}", err),
                                    },
                                };
                                if sender.send(event).await.is_err() {
                                    return;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                break "connection closed".to_string();
                            }
                            Some(Ok(_)) => {}
                            Some(Err(err)) => break err.to_string(),
                        }
                    };

                    tracing::warn!(reason = %reason, "Push socket disconnected");
                    if sender
                        .send(ClientEvent::Disconnected { reason })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Push socket connect failed");
                    let event = ClientEvent::ChannelError {
                        origin: OriginChannel::Socket,
                        message: err.to_string(),
                    };
                    if sender.send(event).await.is_err() {
                        return;
                    }
                }
            }

            let delay = backoff.next_delay();
            tracing::debug!(delay_ms = delay.as_millis() as u64, "Reconnecting push socket");
            tokio::time::sleep(delay).await;
        }
    })
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    let jitter = nanos % jitter_ms;
    base_ms.saturating_add(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(jitter_ms: u64) -> ReconnectConfig {
        ReconnectConfig {
            initial_ms: 100,
            max_ms: 1_000,
            multiplier: 2.0,
            jitter_ms,
        }
    }

    #[test]
    fn test_backoff_grows_to_cap() {
        let mut backoff = Backoff::new(config(0));
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new(config(0));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.current_ms(), 100);
    }

    #[test]
    fn test_jitter_is_bounded() {
        for _ in 0..50 {
            let delay = jittered_backoff(100, 25);
            assert!((100..125).contains(&delay));
        }
    }
}
