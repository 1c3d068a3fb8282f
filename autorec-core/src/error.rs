use thiserror::Error;

/// All errors produced by autorec-core.
#[derive(Debug, Error)]
pub enum AutorecError {
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("capture stream error: {0}")]
    Stream(String),

    #[error("audio writer is no longer accepting commands")]
    WriterUnavailable,

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AutorecError>;
