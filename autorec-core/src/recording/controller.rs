//! Two-state session controller driven by the aggregate signal decision.
//!
//! ```text
//!            on: Begin + Write(chunk)
//!   ┌──────┐ ────────────────────────► ┌────────┐ ◄─┐ on: Write(chunk)
//!   │ Idle │                           │ Active │   │   (+ ClipObserved)
//!   └──────┘ ◄──────────────────────── └────────┘ ──┘
//!                     off: End
//! ```
//!
//! The controller holds no thresholds and never touches the filesystem; it
//! only turns decisions into writer commands.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{
    writer::{AudioWriter, SessionSpec, WriterCommand},
    RecordingConfig,
};
use crate::buffering::chunk::AudioChunk;
use crate::error::Result;
use crate::ipc::events::RecordingEvent;
use crate::signal::AggregateSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Active,
}

/// What a single `observe` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Idle and still silent.
    None,
    Started,
    Continued,
    Stopped,
}

pub struct RecordingController {
    writer: AudioWriter,
    events_rx: Receiver<RecordingEvent>,
    config: RecordingConfig,
    spec: SessionSpec,
    state: ControllerState,
    clipping_seen: bool,
    session_started: Option<Instant>,
    current_file: Option<(u32, PathBuf)>,
}

impl RecordingController {
    pub fn spawn(
        config: RecordingConfig,
        spec: SessionSpec,
        broadcast: Option<broadcast::Sender<RecordingEvent>>,
    ) -> Result<Self> {
        let (events_tx, events_rx) = unbounded();
        let writer = AudioWriter::spawn(&config, events_tx, broadcast)?;
        Ok(Self {
            writer,
            events_rx,
            config,
            spec,
            state: ControllerState::Idle,
            clipping_seen: false,
            session_started: None,
            current_file: None,
        })
    }

    /// Feed one chunk and its aggregate decision.
    pub fn observe(&mut self, signal: AggregateSignal, chunk: AudioChunk) -> Result<Transition> {
        let transition = match (self.state, signal.any_channel_on) {
            (ControllerState::Idle, false) => Transition::None,
            (ControllerState::Idle, true) => {
                self.writer.submit(WriterCommand::Begin(self.spec))?;
                self.state = ControllerState::Active;
                self.session_started = Some(Instant::now());
                self.clipping_seen = false;
                self.current_file = None;
                self.forward(signal, chunk)?;
                Transition::Started
            }
            (ControllerState::Active, true) => {
                self.forward(signal, chunk)?;
                Transition::Continued
            }
            (ControllerState::Active, false) => {
                self.writer.submit(WriterCommand::End)?;
                self.state = ControllerState::Idle;
                if let Some(started) = self.session_started.take() {
                    debug!(
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        clipped = self.clipping_seen,
                        "signal off, ending session"
                    );
                }
                Transition::Stopped
            }
        };
        Ok(transition)
    }

    fn forward(&mut self, signal: AggregateSignal, chunk: AudioChunk) -> Result<()> {
        self.writer.submit(WriterCommand::Write(chunk.samples))?;
        if signal.any_clipping {
            self.clipping_seen = true;
            self.writer.submit(WriterCommand::ClipObserved)?;
        }
        Ok(())
    }

    /// Drain recording events reported by the writer so far.
    pub fn poll_events(&mut self) -> Vec<RecordingEvent> {
        let events: Vec<RecordingEvent> = self.events_rx.try_iter().collect();
        for event in &events {
            self.track(event);
        }
        events
    }

    fn track(&mut self, event: &RecordingEvent) {
        match event {
            RecordingEvent::Started(started) => {
                self.current_file = Some((started.number, started.path.clone()));
            }
            RecordingEvent::Kept(report) | RecordingEvent::Discarded(report) => {
                if self.current_file.as_ref().is_some_and(|(n, _)| *n == report.number) {
                    self.current_file = None;
                }
            }
            RecordingEvent::Failed(_) => {}
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ControllerState::Active
    }

    pub fn clipping_seen(&self) -> bool {
        self.clipping_seen
    }

    /// Path of the open session's file, once the writer has reported it.
    pub fn current_path(&self) -> Option<&Path> {
        if !self.is_active() {
            return None;
        }
        self.current_file.as_ref().map(|(_, path)| path.as_path())
    }

    /// End any active session, shut the writer down and return the events
    /// not yet polled.
    pub fn finish(mut self) -> Vec<RecordingEvent> {
        if self.is_active() {
            if let Err(e) = self.writer.submit(WriterCommand::End) {
                warn!(error = %e, "could not end active session");
            }
            self.state = ControllerState::Idle;
        }
        let timeout = Duration::from_millis(self.config.shutdown_timeout_ms);
        self.writer.shutdown(timeout, self.config.shutdown_policy);
        self.poll_events()
    }
}
