use std::io::{Cursor, Read};
use std::time::{Duration, Instant};

use autorec_core::{
    AutorecEngine, AutorecError, EngineConfig, EngineStatus, PipelineExit, ReaderSource,
    RecordingConfig, RecordingEvent, SampleFormat,
};
use tokio::sync::broadcast::{self, error::TryRecvError};

const FRAMES_PER_CHUNK: usize = 4_800;

fn config() -> EngineConfig {
    EngineConfig {
        sample_rate: 48_000,
        channels: 2,
        format: SampleFormat::S16,
        update_interval_secs: 0.1,
        silence_duration_secs: 0.1,
        ..EngineConfig::default()
    }
}

/// Stereo s16 PCM: `chunks` chunks with `value` on the left channel only.
fn stereo(value: i16, chunks: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(chunks * FRAMES_PER_CHUNK * 4);
    for _ in 0..chunks * FRAMES_PER_CHUNK {
        bytes.extend_from_slice(&value.to_le_bytes());
        bytes.extend_from_slice(&0i16.to_le_bytes());
    }
    bytes
}

fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(v) => out.push(v),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return out,
        }
    }
}

/// A reader that never ends: silence forever.
struct EndlessSilence;

impl Read for EndlessSilence {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        buf.fill(0);
        std::thread::sleep(Duration::from_millis(1));
        Ok(buf.len())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn engine_records_stream_and_reports_events() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = AutorecEngine::new(EngineConfig {
        recording: Some(RecordingConfig::new(dir.path().join("take"))),
        ..config()
    })
    .expect("engine");

    let mut recordings = engine.subscribe_recordings();
    let mut status = engine.subscribe_status();
    let mut snapshots = engine.subscribe_snapshots();

    let mut pcm = stereo(0, 2);
    pcm.extend(stereo(12_000, 6));
    pcm.extend(stereo(0, 2));
    engine
        .start(Box::new(ReaderSource::new(Cursor::new(pcm), "memory")), Vec::new())
        .expect("start");

    let exit = engine.wait().await.expect("pipeline exit");
    assert_eq!(exit, PipelineExit::EndOfStream);
    assert_eq!(engine.status(), EngineStatus::Stopped);
    assert!(!engine.is_running());

    let events = drain(&mut recordings);
    assert!(matches!(events.first(), Some(RecordingEvent::Started(s)) if s.number == 1));
    let Some(RecordingEvent::Kept(report)) = events.last() else {
        panic!("expected a kept session, got {events:?}");
    };
    assert_eq!(report.path, dir.path().join("take.1.wav"));
    assert!((report.duration_secs - 0.6).abs() < 1e-6);

    let statuses: Vec<EngineStatus> = drain(&mut status).iter().map(|e| e.status).collect();
    assert_eq!(statuses.first(), Some(&EngineStatus::Listening));
    assert_eq!(statuses.last(), Some(&EngineStatus::Stopped));

    let snaps = drain(&mut snapshots);
    assert_eq!(snaps.len(), 10);
    assert!(snaps.iter().any(|s| s.recording));
    assert!(snaps[2].channels[0].on && !snaps[2].channels[1].on);

    let d = engine.diagnostics_snapshot();
    assert_eq!(d.chunks_in, 10);
    assert_eq!(d.sessions_kept, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_ends_an_endless_source() {
    let engine = AutorecEngine::new(config()).expect("engine");
    let mut snapshots = engine.subscribe_snapshots();
    engine
        .start(Box::new(ReaderSource::new(EndlessSilence, "endless")), Vec::new())
        .expect("start");

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match snapshots.try_recv() {
            Ok(_) => break,
            Err(_) if Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Err(e) => panic!("no snapshot before deadline: {e}"),
        }
    }

    assert!(matches!(
        engine.start(Box::new(ReaderSource::new(EndlessSilence, "again")), Vec::new()),
        Err(AutorecError::AlreadyRunning)
    ));

    engine.stop().expect("stop");
    let exit = tokio::time::timeout(Duration::from_secs(5), engine.wait())
        .await
        .expect("pipeline exits after stop")
        .expect("join");
    assert_eq!(exit, PipelineExit::Stopped);
    assert_eq!(engine.status(), EngineStatus::Stopped);
    assert!(matches!(engine.stop(), Err(AutorecError::NotRunning)));
}

#[tokio::test(flavor = "multi_thread")]
async fn wait_without_start_is_not_running() {
    let engine = AutorecEngine::new(config()).expect("engine");
    assert!(matches!(engine.wait().await, Err(AutorecError::NotRunning)));
}
