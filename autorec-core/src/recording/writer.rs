//! Background WAV writer.
//!
//! One OS thread owns the open file and the session counter. The analysis
//! thread talks to it only through an unbounded FIFO of [`WriterCommand`]s, so
//! enqueueing never waits on disk I/O. The worker blocks on the queue when it
//! has nothing to do.
//!
//! Every side effect (create, append, finalize, delete, rename) is handled
//! here. Failures are logged and reported as [`RecordingEvent::Failed`]; the
//! worker keeps serving commands afterwards.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::Local;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use hound::{WavSpec, WavWriter};
use tokio::sync::broadcast;
use tracing::{debug, info, info_span, warn, Span};

use super::{
    naming::{FileNumbering, SessionNaming},
    DurationBasis, RecordingConfig, ShutdownPolicy,
};
use crate::audio::format::SampleFormat;
use crate::error::{AutorecError, Result};
use crate::ipc::events::{RecordingEvent, SessionFailure, SessionReport, SessionStarted};

/// Layout of the audio a session will receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub format: SampleFormat,
}

impl SessionSpec {
    fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.format.bits_per_sample(),
            sample_format: hound::SampleFormat::Int,
        }
    }
}

/// Commands accepted by the writer, processed strictly in order.
#[derive(Debug, Clone, PartialEq)]
pub enum WriterCommand {
    /// Open a new numbered file. Ends the open session first, if any.
    Begin(SessionSpec),
    /// Append interleaved samples to the open file.
    Write(Vec<i32>),
    /// Mark the open session as clipped.
    ClipObserved,
    /// Close the open session and decide whether to keep it.
    End,
    /// End any open session, acknowledge and exit.
    Shutdown,
}

/// Handle to the writer thread.
pub struct AudioWriter {
    tx: Sender<WriterCommand>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    discard: Arc<AtomicBool>,
    shut_down: bool,
}

impl AudioWriter {
    /// Scan the output location for the first free number and start the
    /// worker thread.
    ///
    /// Every recording event is sent on `events`; when `broadcast` is set it
    /// is mirrored there too.
    pub fn spawn(
        config: &RecordingConfig,
        events: Sender<RecordingEvent>,
        broadcast: Option<broadcast::Sender<RecordingEvent>>,
    ) -> Result<Self> {
        let numbering = FileNumbering::scan(SessionNaming::from_config(config));
        info!(
            stem = %numbering.naming().stem().display(),
            next = numbering.peek(),
            "audio writer ready"
        );

        let (tx, rx) = unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let discard = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            numbering,
            config: config.clone(),
            events,
            broadcast,
            discard: Arc::clone(&discard),
            session: None,
        };

        let handle = std::thread::Builder::new()
            .name("autorec-writer".into())
            .spawn(move || {
                worker.run(rx);
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            tx,
            done_rx,
            handle: Some(handle),
            discard,
            shut_down: false,
        })
    }

    /// Enqueue a command. Never blocks.
    pub fn submit(&self, cmd: WriterCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .map_err(|_| AutorecError::WriterUnavailable)
    }

    /// Number of commands still waiting in the queue.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }

    /// Ask the worker to finish and wait up to `timeout` for it.
    ///
    /// Returns `false` if the worker did not acknowledge in time; it is then
    /// left to finish on its own.
    pub fn shutdown(&mut self, timeout: Duration, policy: ShutdownPolicy) -> bool {
        if self.shut_down {
            return true;
        }
        self.shut_down = true;

        if policy == ShutdownPolicy::DiscardPending {
            self.discard.store(true, Ordering::SeqCst);
        }
        let pending = self.tx.len();
        if self.tx.send(WriterCommand::Shutdown).is_err() {
            debug!("writer already gone at shutdown");
        }

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        warn!("audio writer thread panicked");
                        return false;
                    }
                }
                debug!(pending, ?policy, "audio writer shut down");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    pending,
                    timeout_ms = timeout.as_millis() as u64,
                    "audio writer did not drain in time; continuing shutdown"
                );
                false
            }
        }
    }
}

impl Drop for AudioWriter {
    fn drop(&mut self) {
        if !self.shut_down {
            let _ = self.tx.send(WriterCommand::Shutdown);
        }
    }
}

struct ActiveSession {
    number: u32,
    path: PathBuf,
    wav: WavWriter<BufWriter<File>>,
    spec: SessionSpec,
    frames_written: u64,
    clipped: bool,
    started_at: chrono::DateTime<Local>,
    started: Instant,
    write_errors: usize,
    span: Span,
}

struct Worker {
    numbering: FileNumbering,
    config: RecordingConfig,
    events: Sender<RecordingEvent>,
    broadcast: Option<broadcast::Sender<RecordingEvent>>,
    discard: Arc<AtomicBool>,
    session: Option<ActiveSession>,
}

impl Worker {
    fn run(mut self, rx: Receiver<WriterCommand>) {
        // recv() fails once every sender is gone; treat that like Shutdown.
        while let Ok(cmd) = rx.recv() {
            match cmd {
                WriterCommand::Begin(spec) => {
                    self.end_session();
                    self.begin_session(spec);
                }
                WriterCommand::Write(samples) => self.write(&samples),
                WriterCommand::ClipObserved => {
                    if let Some(session) = self.session.as_mut() {
                        session.clipped = true;
                    }
                }
                WriterCommand::End => self.end_session(),
                WriterCommand::Shutdown => break,
            }
        }
        self.end_session();
        debug!("audio writer exiting");
    }

    fn begin_session(&mut self, spec: SessionSpec) {
        let number = self.numbering.allocate();
        let path = self.numbering.naming().plain(number);
        let span = info_span!("session", number, path = %path.display());
        let guard = span.enter();

        match WavWriter::create(&path, spec.wav_spec()) {
            Ok(wav) => {
                let started_at = Local::now();
                info!(
                    channels = spec.channels,
                    sample_rate = spec.sample_rate,
                    format = %spec.format,
                    "recording started"
                );
                self.emit(RecordingEvent::Started(SessionStarted {
                    number,
                    path: path.clone(),
                    started_at,
                }));
                drop(guard);
                self.session = Some(ActiveSession {
                    number,
                    path,
                    wav,
                    spec,
                    frames_written: 0,
                    clipped: false,
                    started_at,
                    started: Instant::now(),
                    write_errors: 0,
                    span,
                });
            }
            Err(e) => {
                warn!(error = %e, "could not create recording file");
                self.emit(RecordingEvent::Failed(SessionFailure {
                    number: Some(number),
                    path: Some(path.clone()),
                    reason: format!("create failed: {e}"),
                }));
            }
        }
    }

    fn write(&mut self, samples: &[i32]) {
        if self.discard.load(Ordering::Relaxed) {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        for &sample in samples {
            if let Err(e) = session.wav.write_sample(sample) {
                session.write_errors += 1;
                if session.write_errors == 1 {
                    let _guard = session.span.enter();
                    warn!(error = %e, "write to recording failed");
                }
                return;
            }
        }
        session.frames_written += (samples.len() / session.spec.channels.max(1) as usize) as u64;
    }

    fn end_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let span = session.span.clone();
        let _guard = span.enter();

        let duration_secs = match self.config.duration_basis {
            DurationBasis::Audio => {
                session.frames_written as f64 / session.spec.sample_rate.max(1) as f64
            }
            DurationBasis::WallClock => session.started.elapsed().as_secs_f64(),
        };
        if session.write_errors > 0 {
            warn!(errors = session.write_errors, "session had write errors");
        }

        let ActiveSession {
            number,
            path,
            wav,
            clipped,
            started_at,
            ..
        } = session;

        if let Err(e) = wav.finalize() {
            warn!(error = %e, "could not finalize recording");
            self.emit(RecordingEvent::Failed(SessionFailure {
                number: Some(number),
                path: Some(path),
                reason: format!("finalize failed: {e}"),
            }));
            return;
        }

        let too_short = self
            .config
            .min_length_secs
            .is_some_and(|min| duration_secs < min);

        if too_short {
            if let Err(e) = fs::remove_file(&path) {
                warn!(error = %e, "could not delete short recording");
                self.emit(RecordingEvent::Failed(SessionFailure {
                    number: Some(number),
                    path: Some(path),
                    reason: format!("delete failed: {e}"),
                }));
                return;
            }
            info!(duration_secs, "recording too short, discarded");
            self.emit(RecordingEvent::Discarded(SessionReport {
                number,
                path,
                duration_secs,
                clipped,
                started_at,
            }));
            return;
        }

        let mut final_path = path;
        if clipped && self.config.tag_clipping {
            let tagged = self.numbering.naming().clipped(number);
            match fs::rename(&final_path, &tagged) {
                Ok(()) => {
                    info!(to = %tagged.display(), "recording clipped, renamed");
                    final_path = tagged;
                }
                Err(e) => warn!(error = %e, "could not rename clipped recording"),
            }
        }

        self.numbering.commit(number);
        info!(duration_secs, clipped, path = %final_path.display(), "recording kept");
        self.emit(RecordingEvent::Kept(SessionReport {
            number,
            path: final_path,
            duration_secs,
            clipped,
            started_at,
        }));
    }

    fn emit(&self, event: RecordingEvent) {
        if let Some(tx) = &self.broadcast {
            let _ = tx.send(event.clone());
        }
        let _ = self.events.send(event);
    }
}
