//! Signed little-endian PCM sample formats and their byte codecs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AutorecError, Result};

/// Integer PCM layouts accepted on the capture side and written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    #[serde(alias = "s16le")]
    S16,
    #[serde(alias = "s24le")]
    S24,
    #[serde(alias = "s32le")]
    S32,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 => 4,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }

    /// Magnitude of a full-scale sample: 2^15, 2^23 or 2^31.
    pub fn full_scale(self) -> f64 {
        match self {
            SampleFormat::S16 => 32_768.0,
            SampleFormat::S24 => 8_388_608.0,
            SampleFormat::S32 => 2_147_483_648.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::S16 => "s16",
            SampleFormat::S24 => "s24",
            SampleFormat::S32 => "s32",
        }
    }

    /// Map a WAV `bits_per_sample` field back to a format.
    pub fn from_bits(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(SampleFormat::S16),
            24 => Ok(SampleFormat::S24),
            32 => Ok(SampleFormat::S32),
            other => Err(AutorecError::UnsupportedFormat(format!(
                "{other}-bit integer PCM"
            ))),
        }
    }

    /// Decode interleaved little-endian bytes into `out` (cleared first).
    ///
    /// Trailing bytes that do not form a whole sample are ignored.
    pub fn decode_into(self, bytes: &[u8], out: &mut Vec<i32>) {
        out.clear();
        out.reserve(bytes.len() / self.bytes_per_sample());
        match self {
            SampleFormat::S16 => out.extend(
                bytes
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]) as i32),
            ),
            // Place the 3 bytes in the high end of an i32 and shift back down
            // arithmetically so the sign bit is extended.
            SampleFormat::S24 => out.extend(
                bytes
                    .chunks_exact(3)
                    .map(|b| i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8),
            ),
            SampleFormat::S32 => out.extend(
                bytes
                    .chunks_exact(4)
                    .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            ),
        }
    }

    /// Encode one sample into `out`, which must hold `bytes_per_sample()` bytes.
    pub fn encode_sample(self, sample: i32, out: &mut [u8]) {
        let le = sample.to_le_bytes();
        match self {
            SampleFormat::S16 => out[..2].copy_from_slice(&(sample as i16).to_le_bytes()),
            SampleFormat::S24 => out[..3].copy_from_slice(&le[..3]),
            SampleFormat::S32 => out[..4].copy_from_slice(&le),
        }
    }

    /// Encode a slice of samples, appending to `out`.
    pub fn encode_into(self, samples: &[i32], out: &mut Vec<u8>) {
        let width = self.bytes_per_sample();
        let start = out.len();
        out.resize(start + samples.len() * width, 0);
        for (sample, slot) in samples.iter().zip(out[start..].chunks_exact_mut(width)) {
            self.encode_sample(*sample, slot);
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleFormat {
    type Err = AutorecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s16" | "s16le" => Ok(SampleFormat::S16),
            "s24" | "s24le" => Ok(SampleFormat::S24),
            "s32" | "s32le" => Ok(SampleFormat::S32),
            other => Err(AutorecError::UnsupportedFormat(other.to_string())),
        }
    }
}
