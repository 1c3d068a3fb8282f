//! Pluggable consumers of per-chunk status snapshots.
//!
//! Sinks run on the analysis thread after every chunk, so `publish` must not
//! block. Anything slow belongs behind a channel (see [`BroadcastSink`]).

use tokio::sync::broadcast;
use tracing::{debug, info};

use super::events::StatusSnapshot;

pub trait StatusSink: Send + 'static {
    fn publish(&mut self, snapshot: &StatusSnapshot);

    /// Called once when the pipeline exits.
    fn close(&mut self) {}
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn publish(&mut self, _snapshot: &StatusSnapshot) {}
}

/// Logs signal transitions at info and a level line every `every` chunks at
/// debug.
#[derive(Debug)]
pub struct LogSink {
    every: u64,
    last_on: Option<bool>,
}

impl LogSink {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            last_on: None,
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(25)
    }
}

impl StatusSink for LogSink {
    fn publish(&mut self, snapshot: &StatusSnapshot) {
        if self.last_on != Some(snapshot.signal_on) {
            if self.last_on.is_some() {
                info!(
                    seq = snapshot.seq,
                    on = snapshot.signal_on,
                    "signal {}",
                    if snapshot.signal_on { "on" } else { "off" }
                );
            }
            self.last_on = Some(snapshot.signal_on);
        }

        if snapshot.seq % self.every == 0 {
            let levels: Vec<String> = snapshot
                .channels
                .iter()
                .map(|c| format!("{:.1}/{:.1}", c.rms_db, c.peak_db))
                .collect();
            debug!(
                seq = snapshot.seq,
                levels = %levels.join(" "),
                recording = snapshot.recording,
                clipping = snapshot.clipping,
                "level check"
            );
        }
    }
}

/// Forwards snapshots onto a `tokio::sync::broadcast` channel.
///
/// Send errors (no subscribers) are ignored; lagging subscribers lose the
/// oldest snapshots.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<StatusSnapshot>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<StatusSnapshot>) -> Self {
        Self { tx }
    }
}

impl StatusSink for BroadcastSink {
    fn publish(&mut self, snapshot: &StatusSnapshot) {
        let _ = self.tx.send(snapshot.clone());
    }
}
