//! Capture sources.
//!
//! The engine never talks to audio hardware. It pulls fixed-size byte chunks
//! from a [`CaptureSource`]; anything that can hand out signed little-endian
//! PCM can drive it (a pipe from `arecord`/`pw-record`, a raw file, a WAV
//! file, or a scripted source in tests).
//!
//! A read that returns fewer bytes than requested is end-of-stream. Errors are
//! terminal for the pipeline.

pub mod format;
pub mod wav;

use std::io::{ErrorKind, Read};

use crate::error::{AutorecError, Result};

pub use format::SampleFormat;
pub use wav::WavFileSource;

/// Producer of interleaved PCM chunks.
pub trait CaptureSource: Send + 'static {
    /// Fill `buf` and return how many bytes were written.
    ///
    /// Returning less than `buf.len()` signals end-of-stream.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}

/// Adapter over any blocking [`Read`] (stdin, a pipe, a raw PCM file).
pub struct ReaderSource<R> {
    reader: R,
    label: String,
}

impl<R: Read + Send + 'static> ReaderSource<R> {
    pub fn new(reader: R, label: impl Into<String>) -> Self {
        Self {
            reader,
            label: label.into(),
        }
    }
}

impl ReaderSource<std::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(std::io::stdin(), "stdin")
    }
}

impl<R: Read + Send + 'static> CaptureSource for ReaderSource<R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        // Pipes hand out partial reads; keep going until the buffer is full or
        // the writer side has closed.
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(AutorecError::Stream(format!(
                        "read from {} failed: {e}",
                        self.label
                    )))
                }
            }
        }
        Ok(filled)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
