//! # autorec-core
//!
//! Signal-triggered audio recorder engine.
//!
//! ## Architecture
//!
//! ```text
//! CaptureSource → Pipeline(spawn_blocking)
//!                     │
//!          LevelAnalyzer (per channel)
//!                     │
//!          SignalHistory (per channel) → AggregateSignal
//!                     │                         │
//!            StatusSink(s) ◄── snapshot    RecordingController
//!                                               │  WriterCommand (FIFO)
//!                                          AudioWriter thread → <base>.<N>.wav
//! ```
//!
//! The analysis thread never waits on the filesystem; the writer thread owns
//! the open file and the session counter.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod recording;
pub mod signal;

// Convenience re-exports for downstream crates
pub use audio::{CaptureSource, ReaderSource, SampleFormat, WavFileSource};
pub use engine::{AutorecEngine, EngineConfig, PipelineExit};
pub use error::{AutorecError, Result};
pub use ipc::events::{
    EngineStatus, EngineStatusEvent, RecordingEvent, SessionReport, StatusSnapshot,
};
pub use ipc::sink::{LogSink, NullSink, StatusSink};
pub use recording::{DurationBasis, RecordingConfig, ShutdownPolicy};
