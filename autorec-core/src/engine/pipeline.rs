//! Blocking pipeline loop.
//!
//! ## Pipeline stages (per iteration)
//!
//! ```text
//! 1. Read one chunk from the capture source (short read = end-of-stream)
//! 2. Decode to i32 and split into channels
//! 3. Per channel: LevelAnalyzer → SignalHistory
//! 4. Fold channels into one AggregateSignal
//! 5. RecordingController: Begin / Write / ClipObserved / End
//! 6. Publish an immutable StatusSnapshot to every sink
//! ```
//!
//! This entire loop runs in `spawn_blocking`. The only blocking call is the
//! source read; file I/O happens on the writer thread.

use std::path::Path;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use tracing::{debug, error, info, warn};

use crate::{
    audio::CaptureSource,
    buffering::chunk::AudioChunk,
    engine::EngineConfig,
    ipc::{
        events::{ChannelStatus, RecordingEvent, StatusSnapshot},
        sink::StatusSink,
    },
    recording::{RecordingController, Transition},
    signal::{AggregateSignal, LevelAnalyzer, SignalHistory, WindowedLevel},
};

pub struct PipelineDiagnostics {
    pub chunks_in: AtomicUsize,
    pub chunks_on: AtomicUsize,
    pub clipped_chunks: AtomicUsize,
    pub sessions_started: AtomicUsize,
    pub sessions_kept: AtomicUsize,
    pub sessions_discarded: AtomicUsize,
    pub writer_failures: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            chunks_in: AtomicUsize::new(0),
            chunks_on: AtomicUsize::new(0),
            clipped_chunks: AtomicUsize::new(0),
            sessions_started: AtomicUsize::new(0),
            sessions_kept: AtomicUsize::new(0),
            sessions_discarded: AtomicUsize::new(0),
            writer_failures: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.chunks_in.store(0, Ordering::Relaxed);
        self.chunks_on.store(0, Ordering::Relaxed);
        self.clipped_chunks.store(0, Ordering::Relaxed);
        self.sessions_started.store(0, Ordering::Relaxed);
        self.sessions_kept.store(0, Ordering::Relaxed);
        self.sessions_discarded.store(0, Ordering::Relaxed);
        self.writer_failures.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            chunks_in: self.chunks_in.load(Ordering::Relaxed),
            chunks_on: self.chunks_on.load(Ordering::Relaxed),
            clipped_chunks: self.clipped_chunks.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_kept: self.sessions_kept.load(Ordering::Relaxed),
            sessions_discarded: self.sessions_discarded.load(Ordering::Relaxed),
            writer_failures: self.writer_failures.load(Ordering::Relaxed),
        }
    }

    fn count_events(&self, events: &[RecordingEvent]) {
        for event in events {
            let counter = match event {
                RecordingEvent::Started(_) => &self.sessions_started,
                RecordingEvent::Kept(_) => &self.sessions_kept,
                RecordingEvent::Discarded(_) => &self.sessions_discarded,
                RecordingEvent::Failed(_) => &self.writer_failures,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub chunks_in: usize,
    pub chunks_on: usize,
    pub clipped_chunks: usize,
    pub sessions_started: usize,
    pub sessions_kept: usize,
    pub sessions_discarded: usize,
    pub writer_failures: usize,
}

/// Why `run` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineExit {
    /// The source returned a short read.
    EndOfStream,
    /// `running` was cleared.
    Stopped,
    /// The source returned an error.
    StreamError(String),
}

/// All context the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub config: EngineConfig,
    pub source: Box<dyn CaptureSource>,
    /// `None` runs level monitoring only.
    pub recorder: Option<RecordingController>,
    pub sinks: Vec<Box<dyn StatusSink>>,
    pub running: Arc<AtomicBool>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Run the blocking pipeline until the source ends, fails, or `ctx.running`
/// becomes false. Any open session is closed before returning.
pub fn run(mut ctx: PipelineContext) -> PipelineExit {
    let config = ctx.config.clone();
    let chunk_bytes = config.chunk_bytes();
    info!(
        source = %ctx.source.describe(),
        sample_rate = config.sample_rate,
        channels = config.channels,
        format = %config.format,
        chunk_bytes,
        window_chunks = config.history_len(),
        recording = ctx.recorder.is_some(),
        "pipeline started"
    );

    let analyzer = LevelAnalyzer::from_config(&config);
    let mut history = SignalHistory::from_config(&config);

    // Scratch buffers, reused every iteration.
    let mut raw = vec![0u8; chunk_bytes];
    let mut per_channel: Vec<Vec<i32>> = Vec::with_capacity(config.channels as usize);
    let mut windows: Vec<WindowedLevel> = Vec::with_capacity(config.channels as usize);
    let mut statuses: Vec<ChannelStatus> = Vec::with_capacity(config.channels as usize);
    let mut seq = 0u64;

    let exit = loop {
        // ── 0. Check running flag ─────────────────────────────────────────
        if !ctx.running.load(Ordering::Relaxed) {
            break PipelineExit::Stopped;
        }

        // ── 1. Read one chunk ─────────────────────────────────────────────
        let n = match ctx.source.read_chunk(&mut raw) {
            Ok(n) => n,
            Err(e) => {
                error!("capture source failed: {e}");
                break PipelineExit::StreamError(e.to_string());
            }
        };
        if n < chunk_bytes {
            if n > 0 {
                debug!(bytes = n, "dropping partial trailing chunk");
            }
            break PipelineExit::EndOfStream;
        }
        ctx.diagnostics.chunks_in.fetch_add(1, Ordering::Relaxed);

        // ── 2. Decode ─────────────────────────────────────────────────────
        let chunk = AudioChunk::from_bytes(config.format, &raw, config.channels, config.sample_rate);
        chunk.deinterleave_into(&mut per_channel);

        // ── 3. Per-channel level + history ────────────────────────────────
        windows.clear();
        statuses.clear();
        for (ch, samples) in per_channel.iter().enumerate() {
            let level = analyzer.analyze(samples);
            let windowed = history.update(ch, level);
            windows.push(windowed);
            statuses.push(ChannelStatus {
                rms_db: level.rms_db,
                peak_db: level.peak_db,
                max_rms_db: windowed.max_rms_db,
                max_peak_db: windowed.max_peak_db,
                on: windowed.on,
                clipped: windowed.clipped,
            });
        }

        // ── 4. Aggregate ──────────────────────────────────────────────────
        let signal = AggregateSignal::from_windows(&windows);
        if signal.any_channel_on {
            ctx.diagnostics.chunks_on.fetch_add(1, Ordering::Relaxed);
        }
        if signal.any_clipping {
            ctx.diagnostics.clipped_chunks.fetch_add(1, Ordering::Relaxed);
        }

        // ── 5. Recording ──────────────────────────────────────────────────
        let mut writer_lost = false;
        if let Some(recorder) = ctx.recorder.as_mut() {
            match recorder.observe(signal, chunk) {
                Ok(Transition::Started) => debug!(seq, "signal on, session starting"),
                Ok(Transition::Stopped) => debug!(seq, "signal off, session ending"),
                Ok(_) => {}
                Err(e) => {
                    warn!("recording disabled: {e}");
                    writer_lost = true;
                }
            }
            let events = recorder.poll_events();
            ctx.diagnostics.count_events(&events);
        }
        if writer_lost {
            if let Some(recorder) = ctx.recorder.take() {
                ctx.diagnostics.count_events(&recorder.finish());
            }
        }

        // ── 6. Publish snapshot ───────────────────────────────────────────
        let snapshot = StatusSnapshot {
            seq,
            channels: statuses.clone(),
            signal_on: signal.any_channel_on,
            clipping: signal.any_clipping,
            recording: ctx.recorder.as_ref().is_some_and(|r| r.is_active()),
            file: ctx
                .recorder
                .as_ref()
                .and_then(|r| r.current_path())
                .map(Path::to_path_buf),
        };
        for sink in ctx.sinks.iter_mut() {
            sink.publish(&snapshot);
        }
        seq += 1;
    };

    // ── Orderly shutdown ─────────────────────────────────────────────────
    if let Some(recorder) = ctx.recorder.take() {
        if recorder.is_active() {
            info!("closing active session");
        }
        let events = recorder.finish();
        ctx.diagnostics.count_events(&events);
    }
    for sink in ctx.sinks.iter_mut() {
        sink.close();
    }

    let d = ctx.diagnostics.snapshot();
    info!(
        ?exit,
        chunks_in = d.chunks_in,
        chunks_on = d.chunks_on,
        clipped_chunks = d.clipped_chunks,
        sessions_started = d.sessions_started,
        sessions_kept = d.sessions_kept,
        sessions_discarded = d.sessions_discarded,
        writer_failures = d.writer_failures,
        "pipeline stopped"
    );
    exit
}
