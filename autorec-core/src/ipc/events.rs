//! Event types published by the engine.
//!
//! | Event | Receiver |
//! |-------|----------|
//! | `StatusSnapshot` | `AutorecEngine::subscribe_snapshots`, every `StatusSink` |
//! | `RecordingEvent` | `AutorecEngine::subscribe_recordings` |
//! | `EngineStatusEvent` | `AutorecEngine::subscribe_status` |
//!
//! All types serialize as camelCase JSON so a front-end can consume them
//! unchanged.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Level snapshots
// ---------------------------------------------------------------------------

/// Immutable per-chunk view of the analysis state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Chunk sequence number, starting at 0 for each run.
    pub seq: u64,
    pub channels: Vec<ChannelStatus>,
    /// Aggregate on/off: true while any channel is on.
    pub signal_on: bool,
    /// True while any channel has clipped within its window.
    pub clipping: bool,
    /// True while a recording session is open.
    pub recording: bool,
    /// File of the open session, once the writer has reported it.
    pub file: Option<PathBuf>,
}

/// One channel's row in a `StatusSnapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    pub rms_db: f64,
    pub peak_db: f64,
    pub max_rms_db: f64,
    pub max_peak_db: f64,
    pub on: bool,
    pub clipped: bool,
}

// ---------------------------------------------------------------------------
// Recording events
// ---------------------------------------------------------------------------

/// Reported by the writer exactly once per occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecordingEvent {
    /// A new file was opened.
    Started(SessionStarted),
    /// The session was closed and the file kept.
    Kept(SessionReport),
    /// The session was shorter than the minimum length and its file deleted.
    Discarded(SessionReport),
    /// A filesystem operation failed. The writer carries on.
    Failed(SessionFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub number: u32,
    pub path: PathBuf,
    pub started_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub number: u32,
    /// Final location (the clipped name when the file was renamed).
    pub path: PathBuf,
    pub duration_secs: f64,
    pub clipped: bool,
    pub started_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFailure {
    pub number: Option<u32>,
    pub path: Option<PathBuf>,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Created, `start()` not yet called.
    Idle,
    /// Reading from a capture source.
    Listening,
    /// Source ended or `stop()` was called; the engine may be restarted.
    Stopped,
    /// The capture source failed.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn snapshot_serializes_with_camel_case() {
        let snapshot = StatusSnapshot {
            seq: 3,
            channels: vec![ChannelStatus {
                rms_db: -20.0,
                peak_db: -14.0,
                max_rms_db: -18.0,
                max_peak_db: -10.0,
                on: true,
                clipped: false,
            }],
            signal_on: true,
            clipping: false,
            recording: true,
            file: Some(PathBuf::from("take.1.wav")),
        };

        let json = serde_json::to_value(&snapshot).expect("serialize snapshot");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["signalOn"], true);
        assert_eq!(json["channels"][0]["maxPeakDb"], -10.0);
        assert_eq!(json["file"], "take.1.wav");

        let round_trip: StatusSnapshot =
            serde_json::from_value(json).expect("deserialize snapshot");
        assert_eq!(round_trip, snapshot);
    }

    #[test]
    fn recording_events_are_tagged_by_kind() {
        let started_at = Local
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("valid local time");
        let event = RecordingEvent::Discarded(SessionReport {
            number: 4,
            path: PathBuf::from("take.4.wav"),
            duration_secs: 2.5,
            clipped: true,
            started_at,
        });

        let json = serde_json::to_value(&event).expect("serialize recording event");
        assert_eq!(json["kind"], "discarded");
        assert_eq!(json["number"], 4);
        assert_eq!(json["durationSecs"], 2.5);
        assert!(json["startedAt"].is_string());

        let round_trip: RecordingEvent =
            serde_json::from_value(json).expect("deserialize recording event");
        assert_eq!(round_trip, event);
    }

    #[test]
    fn failure_event_allows_missing_path() {
        let json = r#"{"kind":"failed","number":null,"path":null,"reason":"disk full"}"#;
        let event: RecordingEvent = serde_json::from_str(json).expect("parse failure");
        assert!(matches!(event, RecordingEvent::Failed(f) if f.reason == "disk full"));
    }

    #[test]
    fn engine_status_serializes_lowercase() {
        let event = EngineStatusEvent {
            status: EngineStatus::Listening,
            detail: None,
        };
        let json = serde_json::to_value(&event).expect("serialize status");
        assert_eq!(json["status"], "listening");
        assert!(serde_json::from_str::<EngineStatus>(r#""Listening""#).is_err());
    }
}
