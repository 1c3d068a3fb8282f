//! Per-chunk level metering: RMS, peak and clipping.
//!
//! ## Algorithm
//!
//! 1. RMS = sqrt(mean(s²)) in raw sample units; peak = max |s|.
//! 2. Values below 1.0 (one LSB) map straight to the silence floor `min_db`,
//!    which also keeps `log10(0)` out of the picture.
//! 3. Otherwise `20·log10(value / full_scale)`, clamped to `[min_db, max_db]`.
//! 4. Clipping is set when any |s| reaches `clip_fraction × full_scale`,
//!    regardless of the dB clamp.

use serde::{Deserialize, Serialize};

use crate::audio::format::SampleFormat;
use crate::engine::EngineConfig;

/// Default fraction of full scale treated as clipping (99.9 %).
pub const DEFAULT_CLIP_FRACTION: f64 = 0.999;

/// Instantaneous level of one channel over one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelLevel {
    pub rms_db: f64,
    pub peak_db: f64,
    pub clipped: bool,
}

/// Stateless level meter bound to one sample format and dB scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelAnalyzer {
    full_scale: f64,
    min_db: f64,
    max_db: f64,
    clip_threshold: f64,
}

impl LevelAnalyzer {
    pub fn new(format: SampleFormat, min_db: f64, max_db: f64, clip_fraction: f64) -> Self {
        let full_scale = format.full_scale();
        Self {
            full_scale,
            min_db,
            max_db,
            clip_threshold: clip_fraction * full_scale,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.format,
            config.min_db(),
            config.max_db,
            config.clip_fraction,
        )
    }

    pub fn min_db(&self) -> f64 {
        self.min_db
    }

    pub fn max_db(&self) -> f64 {
        self.max_db
    }

    /// Meter one channel's samples. Pure: the same input always yields the
    /// same level.
    pub fn analyze(&self, samples: &[i32]) -> ChannelLevel {
        let peak = peak(samples);
        ChannelLevel {
            rms_db: self.to_db(rms(samples)),
            peak_db: self.to_db(peak),
            clipped: peak >= self.clip_threshold,
        }
    }

    fn to_db(&self, value: f64) -> f64 {
        if value < 1.0 {
            return self.min_db;
        }
        let db = 20.0 * (value / self.full_scale).log10();
        db.max(self.min_db).min(self.max_db)
    }
}

/// Root-mean-square of raw samples; 0.0 for an empty slice.
pub fn rms(samples: &[i32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Largest absolute sample value; 0.0 for an empty slice.
pub fn peak(samples: &[i32]) -> f64 {
    // unsigned_abs keeps i32::MIN from overflowing.
    samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0) as f64
}
