//! `autorec`: record a PCM stream into one WAV file per burst of signal.
//!
//! Raw interleaved PCM is read from stdin by default, e.g.
//!
//! ```text
//! arecord -t raw -f S32_LE -r 96000 -c 2 | autorec take
//! ```
//!
//! or replayed from a WAV file with `--input`.

mod meter;
mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use autorec_core::{
    AutorecEngine, CaptureSource, DurationBasis, LogSink, PipelineExit, ReaderSource,
    RecordingEvent, StatusSink, WavFileSource,
};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use settings::RecorderDefaults;

/// Signal-triggered audio recorder
#[derive(Parser, Debug)]
#[command(name = "autorec", version)]
#[command(about = "Records audio whenever a signal is present, one numbered WAV per session")]
struct Args {
    /// Output base name; sessions are written to <filename>.<N>.wav
    #[arg(default_value = "recording")]
    filename: PathBuf,

    /// Read from a WAV file instead of raw PCM on stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Sample rate in Hz [default: 96000]
    #[arg(short, long)]
    rate: Option<u32>,

    /// Number of interleaved channels [default: 2]
    #[arg(short, long)]
    channels: Option<u16>,

    /// Sample format: s16, s24 or s32 (an `le` suffix is accepted) [default: s32]
    #[arg(short, long)]
    format: Option<String>,

    /// Seconds of audio per level update [default: 0.2]
    #[arg(long)]
    interval: Option<f64>,

    /// dB range of the meter [default: 90]
    #[arg(long)]
    db_range: Option<f64>,

    /// Top of the dB scale [default: 0]
    #[arg(long, allow_negative_numbers = true)]
    max_db: Option<f64>,

    /// RMS level (dB) below which a channel counts as silent [default: -60]
    #[arg(long, allow_negative_numbers = true)]
    off_threshold: Option<f64>,

    /// Seconds of silence that end a recording [default: 10]
    #[arg(long)]
    silence_duration: Option<f64>,

    /// Recordings shorter than this many seconds are deleted [default: 600]
    #[arg(long)]
    min_length: Option<f64>,

    /// Keep the plain name for recordings that clipped
    #[arg(long)]
    no_clip_tag: bool,

    /// Show levels only, never write files
    #[arg(long)]
    monitor_only: bool,

    /// Draw a level meter on stderr
    #[arg(long)]
    meter: bool,

    /// Defaults file [default: $XDG_CONFIG_HOME/autorec/defaults.json]
    #[arg(long)]
    defaults_file: Option<PathBuf>,

    /// Store the effective options as the new defaults
    #[arg(long)]
    save_defaults: bool,

    /// Print the stored defaults and exit
    #[arg(long)]
    show_defaults: bool,
}

impl Args {
    fn overrides(&self) -> RecorderDefaults {
        RecorderDefaults {
            rate: self.rate,
            channels: self.channels,
            format: self.format.clone(),
            interval: self.interval,
            db_range: self.db_range,
            max_db: self.max_db,
            off_threshold: self.off_threshold,
            silence_duration: self.silence_duration,
            min_length: self.min_length,
            clip_tagging: self.no_clip_tag.then_some(false),
            meter: self.meter.then_some(true),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("autorec=info,autorec_core=info")
                }),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // ── Defaults ──────────────────────────────────────────────────────────
    let defaults_path = args
        .defaults_file
        .clone()
        .unwrap_or_else(settings::default_defaults_path);
    let stored = settings::load_defaults(&defaults_path);
    if args.show_defaults {
        print!("{}", stored.describe(&format!("Defaults ({})", defaults_path.display())));
        return Ok(());
    }

    let cli = {
        let mut cli = args.overrides();
        cli.normalize();
        cli
    };
    if let Some(raw) = &args.format {
        if cli.format.is_none() {
            anyhow::bail!("unsupported sample format: {raw}");
        }
    }

    let mut effective = stored.clone();
    effective.merge(&cli);
    if args.save_defaults {
        settings::save_defaults(&defaults_path, &effective)
            .with_context(|| format!("saving defaults to {}", defaults_path.display()))?;
        info!(path = %defaults_path.display(), "defaults saved");
    }

    // ── Capture source ────────────────────────────────────────────────────
    let base = (!args.monitor_only).then_some(args.filename.as_path());
    let source: Box<dyn CaptureSource>;
    let config = match &args.input {
        Some(path) => {
            let wav = WavFileSource::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            // The file's own layout beats stored defaults; explicit flags still win.
            let mut layered = stored.clone();
            layered.merge(&RecorderDefaults {
                rate: Some(wav.sample_rate()),
                channels: Some(wav.channels()),
                format: Some(wav.format().to_string()),
                ..RecorderDefaults::default()
            });
            layered.merge(&cli);
            let config = layered.engine_config(base, DurationBasis::Audio);
            wav.check_matches(&config)?;
            source = Box::new(wav);
            config
        }
        None => {
            source = Box::new(ReaderSource::stdin());
            effective.engine_config(base, DurationBasis::WallClock)
        }
    };

    let engine = AutorecEngine::new(config).context("invalid configuration")?;
    let cfg = engine.config();
    info!(
        source = %source.describe(),
        rate = cfg.sample_rate,
        channels = cfg.channels,
        format = %cfg.format,
        base = %args.filename.display(),
        recording = cfg.recording.is_some(),
        "autorec starting"
    );

    // ── Session reports ───────────────────────────────────────────────────
    let mut recordings = engine.subscribe_recordings();
    let reporter = tokio::spawn(async move {
        loop {
            match recordings.recv().await {
                Ok(event) => report(&event),
                Err(RecvError::Lagged(n)) => warn!("missed {n} recording events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut sinks: Vec<Box<dyn StatusSink>> = vec![Box::new(LogSink::default())];
    if effective.meter.unwrap_or(false) {
        sinks.push(Box::new(meter::TerminalSink::new(cfg.min_db(), cfg.max_db)));
    }

    // ── Run until end-of-stream or Ctrl-C ─────────────────────────────────
    engine.start(source, sinks)?;
    let exit = {
        let wait = engine.wait();
        tokio::pin!(wait);
        tokio::select! {
            exit = &mut wait => exit?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, closing any open recording");
                if let Err(e) = engine.stop() {
                    warn!("stop: {e}");
                }
                (&mut wait).await?
            }
        }
    };

    drop(engine);
    let _ = reporter.await;

    match exit {
        PipelineExit::StreamError(msg) => anyhow::bail!("capture failed: {msg}"),
        PipelineExit::EndOfStream | PipelineExit::Stopped => {
            info!(?exit, "autorec finished");
            Ok(())
        }
    }
}

fn report(event: &RecordingEvent) {
    match event {
        RecordingEvent::Started(s) => println!("Recording started: {}", s.path.display()),
        RecordingEvent::Kept(r) => println!(
            "Recording saved: {} ({:.1} s{})",
            r.path.display(),
            r.duration_secs,
            if r.clipped { ", clipped" } else { "" }
        ),
        RecordingEvent::Discarded(r) => println!(
            "Recording too short ({:.1} s), deleted: {}",
            r.duration_secs,
            r.path.display()
        ),
        RecordingEvent::Failed(f) => eprintln!("Recording error: {}", f.reason),
    }
}
