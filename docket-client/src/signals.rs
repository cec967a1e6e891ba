//! Sync-agent signal file watcher.
//!
//! The sync agent appends one JSON object per line to a local file. The
//! watcher polls the file, keeps a byte offset and forwards complete lines.

use crate::events::{ClientEvent, PushEvent};
use docket_core::OriginChannel;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Incremental reader over an append-only file.
#[derive(Debug)]
pub struct SignalTail {
    path: PathBuf,
    offset: u64,
    /// Bytes after the last newline; may end inside a UTF-8 sequence.
    partial: Vec<u8>,
}

impl SignalTail {
    /// Start reading at the beginning of the file.
    pub fn from_start(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            partial: Vec::new(),
        }
    }

    /// Skip whatever the file already holds.
    pub async fn from_end(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let offset = tokio::fs::metadata(&path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        Self {
            path,
            offset,
            partial: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read complete lines appended since the last poll.
    ///
    /// A missing file yields nothing. A file shorter than the offset was
    /// truncated or replaced and is read again from the start.
    pub async fn poll(&mut self) -> std::io::Result<Vec<String>> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let len = file.metadata().await?.len();
        if len < self.offset {
            tracing::debug!(path = %self.path.display(), "Signal file truncated, rereading");
            self.offset = 0;
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let before = self.partial.len();
        file.read_to_end(&mut self.partial).await?;
        self.offset += (self.partial.len() - before) as u64;

        // Only complete lines are decoded, so a character split across two
        // appends is never mangled.
        let Some(last_newline) = self.partial.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };
        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        Ok(complete
            .split(|b| *b == b'\n')
            .map(String::from_utf8_lossy)
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }
}

pub fn spawn_signal_watcher(
    path: PathBuf,
    interval: Duration,
    sender: mpsc::Sender<ClientEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tail = SignalTail::from_end(path).await;
        tracing::info!(path = %tail.path().display(), offset = tail.offset(), "Watching signal file");
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let lines = match tail.poll().await {
                Ok(lines) => lines,
                Err(err) => {
                    tracing::warn!(path = %tail.path().display(), error = %err, "Signal file read failed");
                    continue;
                }
            };
            for line in lines {
                let event = match serde_json::from_str::<PushEvent>(&line) {
                    Ok(event) => ClientEvent::Remote {
                        origin: OriginChannel::Signal,
                        event: Box::new(event),
                    },
                    Err(err) => ClientEvent::ChannelError {
                        origin: OriginChannel::Signal,
                        message: format!("Signal decode error: {}", err),
                    },
                };
                if sender.send(event).await.is_err() {
                    return;
                }
            }
        }
    })
}
