//! End-to-end recording scenarios: raw PCM in, WAV files out.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{atomic::AtomicBool, Arc};

use approx::assert_abs_diff_eq;
use autorec_core::engine::pipeline::{self, PipelineContext, PipelineDiagnostics};
use autorec_core::ipc::sink::NullSink;
use autorec_core::recording::RecordingController;
use autorec_core::{
    EngineConfig, PipelineExit, ReaderSource, RecordingConfig, RecordingEvent, SampleFormat,
    SessionReport,
};
use tokio::sync::broadcast;

const RATE: u32 = 48_000;
const INTERVAL: f64 = 0.2;
const FRAMES_PER_CHUNK: usize = 9_600;
const HALF_SCALE: i16 = 16_384;

/// Mono s16 PCM built from `(value, chunks)` runs.
fn pcm(runs: &[(i16, usize)]) -> Vec<i16> {
    runs.iter()
        .flat_map(|&(value, chunks)| std::iter::repeat(value).take(chunks * FRAMES_PER_CHUNK))
        .collect()
}

fn to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn config(dir: &Path, silence_secs: f64, recording: RecordingConfig) -> EngineConfig {
    EngineConfig {
        sample_rate: RATE,
        channels: 1,
        format: SampleFormat::S16,
        update_interval_secs: INTERVAL,
        silence_duration_secs: silence_secs,
        recording: Some(RecordingConfig {
            base_path: dir.join("rec.wav"),
            ..recording
        }),
        ..EngineConfig::default()
    }
}

struct Outcome {
    exit: PipelineExit,
    events: Vec<RecordingEvent>,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl Outcome {
    fn kept(&self) -> Vec<&SessionReport> {
        self.events
            .iter()
            .filter_map(|e| match e {
                RecordingEvent::Kept(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn discarded(&self) -> Vec<&SessionReport> {
        self.events
            .iter()
            .filter_map(|e| match e {
                RecordingEvent::Discarded(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}

fn run(config: EngineConfig, samples: &[i16]) -> Outcome {
    let (tx, mut rx) = broadcast::channel(256);
    let recording = config.recording.clone().expect("recording config");
    let recorder =
        RecordingController::spawn(recording, config.session_spec(), Some(tx)).expect("recorder");
    let diagnostics = Arc::new(PipelineDiagnostics::default());

    let exit = pipeline::run(PipelineContext {
        config,
        source: Box::new(ReaderSource::new(Cursor::new(to_bytes(samples)), "scenario")),
        recorder: Some(recorder),
        sinks: vec![Box::new(NullSink)],
        running: Arc::new(AtomicBool::new(true)),
        diagnostics: Arc::clone(&diagnostics),
    });

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    Outcome {
        exit,
        events,
        diagnostics,
    }
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("dir entry").path())
        .collect();
    files.sort();
    files
}

fn wav_len(path: &Path) -> u32 {
    hound::WavReader::open(path).expect("open wav").len()
}

#[test]
fn single_burst_is_one_kept_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let samples = pcm(&[(0, 5), (HALF_SCALE, 15), (0, 5)]);
    let outcome = run(
        config(dir.path(), INTERVAL, RecordingConfig {
            min_length_secs: Some(0.0),
            ..RecordingConfig::default()
        }),
        &samples,
    );

    assert_eq!(outcome.exit, PipelineExit::EndOfStream);
    let kept = outcome.kept();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].number, 1);
    assert!(!kept[0].clipped);
    assert_abs_diff_eq!(kept[0].duration_secs, 3.0, epsilon = 1e-6);

    let expected = dir.path().join("rec.1.wav");
    assert_eq!(kept[0].path, expected);
    assert_eq!(files_in(dir.path()), vec![expected.clone()]);
    assert_eq!(wav_len(&expected), 15 * FRAMES_PER_CHUNK as u32);

    let d = outcome.diagnostics.snapshot();
    assert_eq!(d.chunks_in, 25);
    assert_eq!(d.sessions_started, 1);
    assert_eq!(d.sessions_kept, 1);
}

#[test]
fn short_session_is_deleted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let samples = pcm(&[(0, 5), (HALF_SCALE, 15), (0, 5)]);
    let outcome = run(
        config(dir.path(), INTERVAL, RecordingConfig {
            min_length_secs: Some(10.0),
            ..RecordingConfig::default()
        }),
        &samples,
    );

    assert!(outcome.kept().is_empty());
    let discarded = outcome.discarded();
    assert_eq!(discarded.len(), 1);
    assert_eq!(discarded[0].number, 1);
    assert_abs_diff_eq!(discarded[0].duration_secs, 3.0, epsilon = 1e-6);
    assert!(files_in(dir.path()).is_empty());
    assert_eq!(outcome.diagnostics.snapshot().sessions_discarded, 1);
}

#[test]
fn mid_session_clip_tags_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut samples = pcm(&[(0, 2), (HALF_SCALE, 10), (0, 2)]);
    // One full-scale sample in the middle of the burst.
    samples[7 * FRAMES_PER_CHUNK + 123] = i16::MAX;
    let outcome = run(
        config(dir.path(), INTERVAL, RecordingConfig {
            tag_clipping: true,
            ..RecordingConfig::default()
        }),
        &samples,
    );

    let kept = outcome.kept();
    assert_eq!(kept.len(), 1);
    assert!(kept[0].clipped);
    let expected = dir.path().join("rec.1.clipped.wav");
    assert_eq!(kept[0].path, expected);
    assert_eq!(files_in(dir.path()), vec![expected]);
}

#[test]
fn short_gap_stays_one_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    // Window of 5 chunks; the 3-chunk gap never empties it.
    let samples = pcm(&[(HALF_SCALE, 5), (0, 3), (HALF_SCALE, 5), (0, 10)]);
    let outcome = run(
        config(dir.path(), 1.0, RecordingConfig::default()),
        &samples,
    );

    let kept = outcome.kept();
    assert_eq!(kept.len(), 1);
    // 13 chunks of burst and gap plus 4 trailing chunks before the window empties.
    assert_abs_diff_eq!(kept[0].duration_secs, 17.0 * INTERVAL, epsilon = 1e-6);
    assert_eq!(files_in(dir.path()), vec![dir.path().join("rec.1.wav")]);
}

#[test]
fn long_gap_splits_sessions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let samples = pcm(&[(HALF_SCALE, 5), (0, 10), (HALF_SCALE, 5), (0, 10)]);
    let outcome = run(
        config(dir.path(), 1.0, RecordingConfig::default()),
        &samples,
    );

    let numbers: Vec<u32> = outcome.kept().iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec![1, 2]);
    assert_eq!(
        files_in(dir.path()),
        vec![dir.path().join("rec.1.wav"), dir.path().join("rec.2.wav")]
    );
}

#[test]
fn discarded_first_session_number_is_reused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let samples = pcm(&[(HALF_SCALE, 2), (0, 10), (HALF_SCALE, 20), (0, 10)]);
    let outcome = run(
        config(dir.path(), 1.0, RecordingConfig {
            min_length_secs: Some(2.0),
            ..RecordingConfig::default()
        }),
        &samples,
    );

    let discarded: Vec<u32> = outcome.discarded().iter().map(|r| r.number).collect();
    let kept: Vec<u32> = outcome.kept().iter().map(|r| r.number).collect();
    assert_eq!(discarded, vec![1]);
    assert_eq!(kept, vec![1]);
    assert_eq!(files_in(dir.path()), vec![dir.path().join("rec.1.wav")]);
}

#[test]
fn existing_takes_are_never_overwritten() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("rec.1.wav"), b"old").expect("seed plain");
    fs::write(dir.path().join("rec.2.clipped.wav"), b"old").expect("seed clipped");

    let samples = pcm(&[(HALF_SCALE, 3), (0, 2)]);
    let outcome = run(
        config(dir.path(), INTERVAL, RecordingConfig::default()),
        &samples,
    );

    let kept = outcome.kept();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].path, dir.path().join("rec.3.wav"));
    assert_eq!(fs::read(dir.path().join("rec.1.wav")).expect("read"), b"old");
}

#[test]
fn signal_running_to_end_of_stream_is_still_kept() {
    let dir = tempfile::tempdir().expect("tempdir");
    let samples = pcm(&[(0, 1), (HALF_SCALE, 4)]);
    let outcome = run(
        config(dir.path(), INTERVAL, RecordingConfig::default()),
        &samples,
    );

    let kept = outcome.kept();
    assert_eq!(kept.len(), 1);
    assert_abs_diff_eq!(kept[0].duration_secs, 0.8, epsilon = 1e-6);
}
