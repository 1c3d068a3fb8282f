pub mod events;
pub mod sink;

pub use events::{
    ChannelStatus, EngineStatus, EngineStatusEvent, RecordingEvent, SessionFailure,
    SessionReport, SessionStarted, StatusSnapshot,
};
pub use sink::{BroadcastSink, LogSink, NullSink, StatusSink};
