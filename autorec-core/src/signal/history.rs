//! Sliding-window hysteresis over per-chunk channel levels.
//!
//! Each channel keeps three parallel windows (RMS dB, peak dB, clip flag) of
//! the last `W` chunks. A channel is "on" while *any* RMS value in the window
//! is above the off threshold, so it only turns off after `W` consecutive
//! chunks at or below the threshold. That is what keeps a short pause inside
//! a recording from splitting it into several files.

use super::level::ChannelLevel;
use crate::buffering::Window;
use crate::engine::EngineConfig;

/// Window-derived view of one channel after an update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowedLevel {
    pub max_rms_db: f64,
    pub max_peak_db: f64,
    pub on: bool,
    pub clipped: bool,
}

struct ChannelWindow {
    rms: Window<f64>,
    peak: Window<f64>,
    clip: Window<bool>,
}

impl ChannelWindow {
    fn new(capacity: usize) -> Self {
        Self {
            rms: Window::new(capacity),
            peak: Window::new(capacity),
            clip: Window::new(capacity),
        }
    }

    fn clear(&mut self) {
        self.rms.clear();
        self.peak.clear();
        self.clip.clear();
    }
}

/// Per-channel level history, owned by the analysis thread.
pub struct SignalHistory {
    windows: Vec<ChannelWindow>,
    capacity: usize,
    off_threshold_db: f64,
    min_db: f64,
    track_peak: bool,
    track_clipping: bool,
}

impl SignalHistory {
    /// `capacity` is the window length `W` in chunks (raised to 1).
    pub fn new(channels: usize, capacity: usize, off_threshold_db: f64, min_db: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            windows: (0..channels).map(|_| ChannelWindow::new(capacity)).collect(),
            capacity,
            off_threshold_db,
            min_db,
            track_peak: true,
            track_clipping: true,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.channels as usize,
            config.history_len(),
            config.off_threshold_db,
            config.min_db(),
        )
        .with_tracking(config.track_peak, config.track_clipping)
    }

    /// Enable or disable the peak and clip windows. Disabled windows report
    /// `min_db` / `false`.
    pub fn with_tracking(mut self, peak: bool, clipping: bool) -> Self {
        self.track_peak = peak;
        self.track_clipping = clipping;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channels(&self) -> usize {
        self.windows.len()
    }

    /// Push one chunk's level for `channel` and recompute the window view.
    ///
    /// An out-of-range channel records nothing and reports the empty-window
    /// answer.
    pub fn update(&mut self, channel: usize, level: ChannelLevel) -> WindowedLevel {
        let Some(window) = self.windows.get_mut(channel) else {
            return self.empty();
        };

        window.rms.push(level.rms_db);
        if self.track_peak {
            window.peak.push(level.peak_db);
        }
        if self.track_clipping {
            window.clip.push(level.clipped);
        }

        let floor = self.min_db;
        WindowedLevel {
            max_rms_db: window.rms.iter().copied().fold(floor, f64::max),
            max_peak_db: window.peak.iter().copied().fold(floor, f64::max),
            on: window.rms.iter().any(|&db| db > self.off_threshold_db),
            clipped: window.clip.iter().any(|&c| c),
        }
    }

    /// Current on/off of a channel without pushing a new value.
    pub fn is_channel_on(&self, channel: usize) -> bool {
        self.windows
            .get(channel)
            .is_some_and(|w| w.rms.iter().any(|&db| db > self.off_threshold_db))
    }

    pub fn any_channel_on(&self) -> bool {
        (0..self.windows.len()).any(|ch| self.is_channel_on(ch))
    }

    /// Forget all history (every channel reads as off).
    pub fn reset(&mut self) {
        for window in &mut self.windows {
            window.clear();
        }
    }

    fn empty(&self) -> WindowedLevel {
        WindowedLevel {
            max_rms_db: self.min_db,
            max_peak_db: self.min_db,
            on: false,
            clipped: false,
        }
    }
}
