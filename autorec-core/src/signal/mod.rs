//! Signal detection: per-chunk metering and the hysteresis window.
//!
//! `LevelAnalyzer` is pure; `SignalHistory` owns all state. The pipeline runs
//! both for every channel of a chunk and only then folds the per-channel
//! answers into one `AggregateSignal`, which is the sole input the recording
//! controller sees.

pub mod history;
pub mod level;

pub use history::{SignalHistory, WindowedLevel};
pub use level::{ChannelLevel, LevelAnalyzer, DEFAULT_CLIP_FRACTION};

/// Channel-wide decision for one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSignal {
    /// OR of every channel's windowed on/off.
    pub any_channel_on: bool,
    /// OR of every channel's clip-in-window flag.
    pub any_clipping: bool,
}

impl AggregateSignal {
    pub fn from_windows<'a>(windows: impl IntoIterator<Item = &'a WindowedLevel>) -> Self {
        windows
            .into_iter()
            .fold(Self::default(), |acc, w| Self {
                any_channel_on: acc.any_channel_on || w.on,
                any_clipping: acc.any_clipping || w.clipped,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windowed(on: bool, clipped: bool) -> WindowedLevel {
        WindowedLevel {
            max_rms_db: -20.0,
            max_peak_db: -10.0,
            on,
            clipped,
        }
    }

    #[test]
    fn aggregate_is_or_over_channels() {
        let levels = [windowed(false, false), windowed(true, false), windowed(false, true)];
        let agg = AggregateSignal::from_windows(&levels);
        assert!(agg.any_channel_on);
        assert!(agg.any_clipping);
    }

    #[test]
    fn aggregate_of_nothing_is_off() {
        let none: [WindowedLevel; 0] = [];
        let agg = AggregateSignal::from_windows(&none);
        assert_eq!(agg, AggregateSignal::default());
    }
}
