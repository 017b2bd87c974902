use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

/// Receives human-readable progress text. Must not fail.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Receives batch-level and per-file progress. Must not fail.
pub trait ProgressSink: Send + Sync {
    /// `label` reads like "Downloading Modrinth mods (2/5)".
    fn batch(&self, label: &str, current: usize, total: usize);

    /// Only called when the server declared a content length.
    fn file(&self, entry: &str, percent: u8, bytes_done: u64, bytes_total: u64);
}

/// Listener set threaded through a reconciliation pass.
#[derive(Clone, Copy)]
pub struct Sinks<'a> {
    pub log: &'a dyn LogSink,
    pub progress: Option<&'a dyn ProgressSink>,
}

impl<'a> Sinks<'a> {
    pub fn new(log: &'a dyn LogSink) -> Self {
        Self {
            log,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn log(&self, message: impl AsRef<str>) {
        self.log.log(message.as_ref());
    }

    pub fn batch(&self, label: &str, current: usize, total: usize) {
        if let Some(progress) = self.progress {
            progress.batch(label, current, total);
        }
    }

    pub fn file(&self, entry: &str, percent: u8, bytes_done: u64, bytes_total: u64) {
        if let Some(progress) = self.progress {
            progress.file(entry, percent, bytes_done, bytes_total);
        }
    }
}

/// Discards everything.
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _message: &str) {}
}

impl ProgressSink for NullSink {
    fn batch(&self, _label: &str, _current: usize, _total: usize) {}
    fn file(&self, _entry: &str, _percent: u8, _bytes_done: u64, _bytes_total: u64) {}
}

/// Forwards to `tracing` under the `modsync` target.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str) {
        info!(target: "modsync", "{}", message);
    }
}

impl ProgressSink for TracingSink {
    fn batch(&self, label: &str, current: usize, total: usize) {
        info!(target: "modsync", current, total, "{}", label);
    }

    fn file(&self, entry: &str, percent: u8, bytes_done: u64, bytes_total: u64) {
        info!(
            target: "modsync",
            "  {}: {}% ({} / {})",
            entry,
            percent,
            format_mb(bytes_done),
            format_mb(bytes_total)
        );
    }
}

/// Event payload for frontends listening on a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncEvent {
    Log {
        message: String,
    },
    Batch {
        label: String,
        current: usize,
        total: usize,
    },
    File {
        entry: String,
        percent: u8,
        bytes_done: u64,
        bytes_total: u64,
    },
}

/// Sends `SyncEvent`s over an unbounded channel; a dropped receiver is ignored.
pub struct ChannelSink {
    tx: UnboundedSender<SyncEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<SyncEvent>) -> Self {
        Self { tx }
    }
}

impl LogSink for ChannelSink {
    fn log(&self, message: &str) {
        let _ = self.tx.send(SyncEvent::Log {
            message: message.to_string(),
        });
    }
}

impl ProgressSink for ChannelSink {
    fn batch(&self, label: &str, current: usize, total: usize) {
        let _ = self.tx.send(SyncEvent::Batch {
            label: label.to_string(),
            current,
            total,
        });
    }

    fn file(&self, entry: &str, percent: u8, bytes_done: u64, bytes_total: u64) {
        let _ = self.tx.send(SyncEvent::File {
            entry: entry.to_string(),
            percent,
            bytes_done,
            bytes_total,
        });
    }
}

/// Keeps every log line in memory. Handy for summaries and tests.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }
}

/// `1572864` -> `"1.5MB"`, two decimals at most.
pub fn format_mb(bytes: u64) -> String {
    let mb = (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0;
    format!("{mb}MB")
}
