//! Signal-triggered recording: session state machine, file naming and the
//! background WAV writer.
//!
//! ```text
//! pipeline ──observe()──► RecordingController ──WriterCommand──► AudioWriter
//!                               ▲                                   │
//!                               └────────── RecordingEvent ◄────────┘
//! ```
//!
//! The controller decides *when* sessions start and stop; the writer owns the
//! open file, the file-number counter and every filesystem side effect.

pub mod controller;
pub mod naming;
pub mod writer;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use controller::{ControllerState, RecordingController, Transition};
pub use naming::{FileNumbering, SessionNaming};
pub use writer::{AudioWriter, SessionSpec, WriterCommand};

/// How a finished session's length is measured for the minimum-length check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DurationBasis {
    /// Frames written divided by the sample rate.
    #[default]
    Audio,
    /// Wall-clock time between `Begin` and `End`.
    WallClock,
}

/// What happens to queued audio when the writer is shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShutdownPolicy {
    /// Write everything already queued, then close the session.
    #[default]
    Drain,
    /// Skip queued `Write`s; the session is still closed normally.
    DiscardPending,
}

/// Output settings for the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingConfig {
    /// Base file name. A trailing `.<extension>` is stripped.
    pub base_path: PathBuf,
    /// Output extension without the dot. Default: `wav`.
    pub extension: String,
    /// Sessions shorter than this are deleted. `None` keeps everything.
    pub min_length_secs: Option<f64>,
    /// Rename sessions that clipped to `<base>.<N>.clipped.<ext>`.
    pub tag_clipping: bool,
    pub duration_basis: DurationBasis,
    pub shutdown_policy: ShutdownPolicy,
    /// How long `stop` waits for the writer to drain.
    pub shutdown_timeout_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("recording"),
            extension: "wav".into(),
            min_length_secs: None,
            tag_clipping: false,
            duration_basis: DurationBasis::Audio,
            shutdown_policy: ShutdownPolicy::Drain,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl RecordingConfig {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }
}
