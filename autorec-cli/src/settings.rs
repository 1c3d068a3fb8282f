//! Persisted recorder defaults (JSON file in the user config directory).
//!
//! Every field is optional: a value left unset falls through to the next
//! layer. Precedence, lowest first: built-in defaults, the defaults file, the
//! WAV header of `--input`, explicit command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use autorec_core::{DurationBasis, EngineConfig, RecordingConfig, SampleFormat};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Minimum recording length when none is configured, in seconds.
pub const DEFAULT_MIN_LENGTH_SECS: f64 = 600.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct RecorderDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_range: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_db: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub off_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silence_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_tagging: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meter: Option<bool>,
}

impl RecorderDefaults {
    /// Drop values the engine would reject and canonicalize the rest.
    pub fn normalize(&mut self) {
        self.rate = self.rate.filter(|r| *r > 0);
        self.channels = self.channels.filter(|c| *c > 0);
        self.format = self
            .format
            .as_deref()
            .and_then(|f| f.parse::<SampleFormat>().ok())
            .map(|f| f.to_string());
        self.interval = self.interval.filter(|i| i.is_finite() && *i > 0.0);
        self.db_range = self
            .db_range
            .filter(|r| r.is_finite() && *r > 0.0)
            .map(|r| r.min(200.0));
        self.max_db = self.max_db.filter(|d| d.is_finite());
        self.off_threshold = self.off_threshold.filter(|d| d.is_finite());
        self.silence_duration = self
            .silence_duration
            .filter(|s| s.is_finite())
            .map(|s| s.max(0.0));
        self.min_length = self.min_length.filter(|m| m.is_finite()).map(|m| m.max(0.0));
    }

    /// Overlay every value that is set in `other`.
    pub fn merge(&mut self, other: &RecorderDefaults) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field.clone();
                })*
            };
        }
        take!(
            rate,
            channels,
            format,
            interval,
            db_range,
            max_db,
            off_threshold,
            silence_duration,
            min_length,
            clip_tagging,
            meter
        );
    }

    /// Effective engine configuration. `base` is the output base name;
    /// `None` disables recording. Live capture measures takes on the wall
    /// clock, file replay by the audio written.
    pub fn engine_config(
        &self,
        base: Option<&Path>,
        duration_basis: DurationBasis,
    ) -> EngineConfig {
        let builtin = EngineConfig::default();
        let format = self
            .format
            .as_deref()
            .and_then(|f| f.parse::<SampleFormat>().ok())
            .unwrap_or(builtin.format);

        EngineConfig {
            sample_rate: self.rate.unwrap_or(builtin.sample_rate),
            channels: self.channels.unwrap_or(builtin.channels),
            format,
            update_interval_secs: self.interval.unwrap_or(builtin.update_interval_secs),
            db_range: self.db_range.unwrap_or(builtin.db_range),
            max_db: self.max_db.unwrap_or(builtin.max_db),
            off_threshold_db: self.off_threshold.unwrap_or(builtin.off_threshold_db),
            silence_duration_secs: self
                .silence_duration
                .unwrap_or(builtin.silence_duration_secs),
            recording: base.map(|base| RecordingConfig {
                min_length_secs: Some(self.min_length.unwrap_or(DEFAULT_MIN_LENGTH_SECS)),
                tag_clipping: self.clip_tagging.unwrap_or(true),
                duration_basis,
                ..RecordingConfig::new(base)
            }),
            ..builtin
        }
    }

    /// Human-readable listing of the values that are set.
    pub fn describe(&self, title: &str) -> String {
        let mut out = format!("{title}:\n");
        let mut line = |label: &str, value: String| {
            out.push_str(&format!("  {label:<20}{value}\n"));
        };
        if let Some(rate) = self.rate {
            line("Sample rate:", format!("{rate} Hz"));
        }
        if let Some(channels) = self.channels {
            line("Channels:", channels.to_string());
        }
        if let Some(format) = &self.format {
            line("Format:", format.clone());
        }
        if let Some(interval) = self.interval {
            line("Update interval:", format!("{interval} seconds"));
        }
        if let Some(db_range) = self.db_range {
            line("dB range:", format!("{db_range} dB"));
        }
        if let Some(max_db) = self.max_db {
            line("Maximum dB:", format!("{max_db} dB"));
        }
        if let Some(off) = self.off_threshold {
            line("Off threshold:", format!("{off} dB"));
        }
        if let Some(silence) = self.silence_duration {
            line("Silence duration:", format!("{silence} seconds"));
        }
        if let Some(min) = self.min_length {
            line("Min recording:", format!("{min} seconds"));
        }
        if let Some(tag) = self.clip_tagging {
            line("Clip tagging:", if tag { "enabled" } else { "disabled" }.into());
        }
        if let Some(meter) = self.meter {
            line("Level meter:", if meter { "enabled" } else { "disabled" }.into());
        }
        out
    }
}

pub fn default_defaults_path() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        })
        .join("autorec")
        .join("defaults.json")
}

/// Missing or unreadable files yield empty defaults.
pub fn load_defaults(path: &Path) -> RecorderDefaults {
    let mut defaults = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<RecorderDefaults>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring malformed defaults file: {e}");
            RecorderDefaults::default()
        }),
        Err(_) => RecorderDefaults::default(),
    };
    defaults.normalize();
    defaults
}

pub fn save_defaults(path: &Path, defaults: &RecorderDefaults) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(defaults).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
