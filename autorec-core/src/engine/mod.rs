//! `AutorecEngine`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! AutorecEngine::new(config)   → config validated, status = Idle
//!     └─► start(source, sinks) → writer spawned, pipeline spawned, status = Listening
//!         ├─► source ends      → session closed, status = Stopped
//!         ├─► source fails     → session closed, status = Error
//!         └─► stop()           → running=false, pipeline exits, status = Stopped
//! ```
//!
//! `start()` needs a Tokio runtime: the pipeline runs in `spawn_blocking`
//! because capture reads block. `wait()` resolves with the reason the
//! pipeline exited.

pub mod pipeline;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{error, info};

use crate::{
    audio::{format::SampleFormat, CaptureSource},
    error::{AutorecError, Result},
    ipc::{
        events::{EngineStatus, EngineStatusEvent, RecordingEvent, StatusSnapshot},
        sink::{BroadcastSink, StatusSink},
    },
    recording::{RecordingConfig, RecordingController, SessionSpec},
    signal::DEFAULT_CLIP_FRACTION,
};

pub use pipeline::{DiagnosticsSnapshot, PipelineDiagnostics, PipelineExit};

/// Broadcast channel capacity for snapshots and events.
const BROADCAST_CAP: usize = 256;

/// Configuration for `AutorecEngine`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Capture sample rate (Hz). Default: 96000.
    pub sample_rate: u32,
    /// Interleaved channel count. Default: 2.
    pub channels: u16,
    /// Default: s32.
    pub format: SampleFormat,
    /// Seconds of audio per chunk. Default: 0.2.
    pub update_interval_secs: f64,
    /// Width of the dB scale below `max_db`. Default: 90.
    pub db_range: f64,
    /// Top of the dB scale. Default: 0.
    pub max_db: f64,
    /// A channel is on while its RMS is above this. Default: -60.
    pub off_threshold_db: f64,
    /// Seconds of continuous silence before a channel turns off. Default: 10.
    pub silence_duration_secs: f64,
    /// Fraction of full scale that counts as clipping. Default: 0.999.
    pub clip_fraction: f64,
    pub track_peak: bool,
    pub track_clipping: bool,
    /// `None` runs level monitoring only.
    pub recording: Option<RecordingConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 96_000,
            channels: 2,
            format: SampleFormat::S32,
            update_interval_secs: 0.2,
            db_range: 90.0,
            max_db: 0.0,
            off_threshold_db: -60.0,
            silence_duration_secs: 10.0,
            clip_fraction: DEFAULT_CLIP_FRACTION,
            track_peak: true,
            track_clipping: true,
            recording: None,
        }
    }
}

impl EngineConfig {
    /// Bottom of the dB scale.
    pub fn min_db(&self) -> f64 {
        self.max_db - self.db_range
    }

    /// Hysteresis window length in chunks (at least 1).
    pub fn history_len(&self) -> usize {
        let chunks = (self.silence_duration_secs / self.update_interval_secs + 1e-9).floor();
        if chunks.is_finite() && chunks >= 1.0 {
            chunks as usize
        } else {
            1
        }
    }

    /// Whole frames per chunk.
    pub fn frames_per_chunk(&self) -> usize {
        let frames = (self.sample_rate as f64 * self.update_interval_secs + 1e-9).floor();
        if frames.is_finite() && frames > 0.0 {
            frames as usize
        } else {
            0
        }
    }

    pub fn chunk_bytes(&self) -> usize {
        self.frames_per_chunk() * self.channels as usize * self.format.bytes_per_sample()
    }

    pub fn session_spec(&self) -> SessionSpec {
        SessionSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            format: self.format,
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AutorecError::InvalidConfig(msg));

        if self.channels == 0 {
            return invalid("channel count must be at least 1".into());
        }
        if self.sample_rate == 0 {
            return invalid("sample rate must be positive".into());
        }
        if !(self.update_interval_secs.is_finite() && self.update_interval_secs > 0.0) {
            return invalid(format!(
                "update interval must be positive, got {}",
                self.update_interval_secs
            ));
        }
        if self.frames_per_chunk() == 0 {
            return invalid(format!(
                "update interval {}s is shorter than one frame at {} Hz",
                self.update_interval_secs, self.sample_rate
            ));
        }
        if !(self.db_range.is_finite() && self.db_range > 0.0) || !self.max_db.is_finite() {
            return invalid(format!(
                "dB scale must be finite with a positive range, got max {} range {}",
                self.max_db, self.db_range
            ));
        }
        if !self.off_threshold_db.is_finite() {
            return invalid("off threshold must be finite".into());
        }
        if !(self.silence_duration_secs.is_finite() && self.silence_duration_secs >= 0.0) {
            return invalid(format!(
                "silence duration must be non-negative, got {}",
                self.silence_duration_secs
            ));
        }
        if !(self.clip_fraction > 0.0 && self.clip_fraction <= 1.0) {
            return invalid(format!(
                "clip fraction must be in (0, 1], got {}",
                self.clip_fraction
            ));
        }
        if let Some(recording) = &self.recording {
            if recording.base_path.as_os_str().is_empty() {
                return invalid("recording base path is empty".into());
            }
            if recording.extension.trim_start_matches('.').is_empty() {
                return invalid("recording extension is empty".into());
            }
            if let Some(min) = recording.min_length_secs {
                if !(min.is_finite() && min >= 0.0) {
                    return invalid(format!("minimum length must be non-negative, got {min}"));
                }
            }
        }
        Ok(())
    }
}

/// The top-level engine handle.
///
/// `AutorecEngine` is `Send + Sync`; wrap it in an `Arc` to share it with
/// event-forwarding tasks.
pub struct AutorecEngine {
    config: EngineConfig,
    /// `true` while the pipeline is reading.
    running: Arc<AtomicBool>,
    status: Arc<Mutex<EngineStatus>>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    snapshot_tx: broadcast::Sender<StatusSnapshot>,
    recording_tx: broadcast::Sender<RecordingEvent>,
    diagnostics: Arc<PipelineDiagnostics>,
    task: Mutex<Option<JoinHandle<PipelineExit>>>,
}

impl AutorecEngine {
    /// Validate `config` and create an idle engine.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (snapshot_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (recording_tx, _) = broadcast::channel(BROADCAST_CAP);

        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            status_tx,
            snapshot_tx,
            recording_tx,
            diagnostics: Arc::new(PipelineDiagnostics::default()),
            task: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start reading `source` on a blocking task.
    ///
    /// Snapshots go to every sink in `sinks` and to `subscribe_snapshots()`.
    ///
    /// # Errors
    /// - `AutorecError::AlreadyRunning` if a pipeline is active.
    /// - Writer spawn failures.
    pub fn start(
        &self,
        source: Box<dyn CaptureSource>,
        sinks: Vec<Box<dyn StatusSink>>,
    ) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AutorecError::AlreadyRunning);
        }

        let recorder = match &self.config.recording {
            Some(recording) => match RecordingController::spawn(
                recording.clone(),
                self.config.session_spec(),
                Some(self.recording_tx.clone()),
            ) {
                Ok(r) => Some(r),
                Err(e) => {
                    self.running.store(false, Ordering::SeqCst);
                    self.set_status(EngineStatus::Error, Some(e.to_string()));
                    return Err(e);
                }
            },
            None => None,
        };

        self.diagnostics.reset();
        self.set_status(EngineStatus::Listening, None);

        let mut sinks = sinks;
        sinks.push(Box::new(BroadcastSink::new(self.snapshot_tx.clone())));

        // Clone all Arc-wrapped state before moving into the closure.
        let ctx = pipeline::PipelineContext {
            config: self.config.clone(),
            source,
            recorder,
            sinks,
            running: Arc::clone(&self.running),
            diagnostics: Arc::clone(&self.diagnostics),
        };
        let running = Arc::clone(&self.running);
        let status = Arc::clone(&self.status);
        let status_tx = self.status_tx.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let exit = pipeline::run(ctx);
            running.store(false, Ordering::SeqCst);
            let (next, detail) = match &exit {
                PipelineExit::StreamError(msg) => (EngineStatus::Error, Some(msg.clone())),
                _ => (EngineStatus::Stopped, None),
            };
            publish_status(&status, &status_tx, next, detail);
            exit
        });
        *self.task.lock() = Some(handle);

        info!("engine started, listening");
        Ok(())
    }

    /// Ask the pipeline to stop after the current chunk.
    ///
    /// # Errors
    /// - `AutorecError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(AutorecError::NotRunning);
        }
        info!("engine stop requested");
        Ok(())
    }

    /// Wait for the pipeline started by the last `start()` to exit.
    pub async fn wait(&self) -> Result<PipelineExit> {
        let handle = self.task.lock().take().ok_or(AutorecError::NotRunning)?;
        handle.await.map_err(|e| {
            error!("pipeline task failed: {e}");
            AutorecError::Other(anyhow::anyhow!("pipeline task failed: {e}"))
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Subscribe to per-chunk level snapshots.
    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Subscribe to recording session events.
    pub fn subscribe_recordings(&self) -> broadcast::Receiver<RecordingEvent> {
        self.recording_tx.subscribe()
    }

    /// Subscribe to live status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        publish_status(&self.status, &self.status_tx, new_status, detail);
    }
}

fn publish_status(
    status: &Mutex<EngineStatus>,
    tx: &broadcast::Sender<EngineStatusEvent>,
    new_status: EngineStatus,
    detail: Option<String>,
) {
    *status.lock() = new_status;
    let _ = tx.send(EngineStatusEvent {
        status: new_status,
        detail,
    });
}
