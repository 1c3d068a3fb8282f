//! Typed audio chunk passed from the capture source to analysis and the writer.

use crate::audio::format::SampleFormat;

/// A block of interleaved integer PCM covering one update interval.
///
/// Allocated once per pipeline iteration (on the analysis thread) and handed
/// to the writer by value when a session is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Interleaved samples, frame-major: `[f0c0, f0c1, f1c0, ...]`.
    pub samples: Vec<i32>,
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<i32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// Decode raw little-endian bytes as delivered by a capture source.
    pub fn from_bytes(format: SampleFormat, bytes: &[u8], channels: u16, sample_rate: u32) -> Self {
        let mut samples = Vec::new();
        format.decode_into(bytes, &mut samples);
        Self::new(samples, channels, sample_rate)
    }

    /// Number of whole frames in the chunk.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Returns the duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate the samples of one channel.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = i32> + '_ {
        let stride = self.channels.max(1) as usize;
        self.samples.iter().skip(channel).step_by(stride).copied()
    }

    /// Split into per-channel buffers, reusing the allocations in `out`.
    ///
    /// `out` is resized to the channel count.
    pub fn deinterleave_into(&self, out: &mut Vec<Vec<i32>>) {
        let channels = self.channels.max(1) as usize;
        out.resize_with(channels, Vec::new);
        for (ch, buf) in out.iter_mut().enumerate() {
            buf.clear();
            buf.extend(self.channel(ch));
        }
    }
}
