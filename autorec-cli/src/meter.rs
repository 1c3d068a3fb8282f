//! One-line terminal level meter.

use std::io::{self, Write};

use autorec_core::{StatusSink, StatusSnapshot};

const BAR_WIDTH: usize = 30;

/// Redraws a single stderr line per snapshot.
pub struct TerminalSink {
    min_db: f64,
    max_db: f64,
    drawn: bool,
}

impl TerminalSink {
    pub fn new(min_db: f64, max_db: f64) -> Self {
        Self {
            min_db,
            max_db,
            drawn: false,
        }
    }
}

impl StatusSink for TerminalSink {
    fn publish(&mut self, snapshot: &StatusSnapshot) {
        let line = render_line(snapshot, self.min_db, self.max_db, BAR_WIDTH);
        let mut err = io::stderr().lock();
        let _ = write!(err, "\r{line}\x1b[K");
        let _ = err.flush();
        self.drawn = true;
    }

    fn close(&mut self) {
        if self.drawn {
            eprintln!();
        }
    }
}

/// `[REC]`/`[---]`, then per channel a bar filled to the RMS level with `|`
/// at the windowed peak, then the RMS in dB and `C` when clipping.
pub fn render_line(snapshot: &StatusSnapshot, min_db: f64, max_db: f64, width: usize) -> String {
    let mut line = String::from(if snapshot.recording { "[REC]" } else { "[---]" });
    let span = (max_db - min_db).max(f64::EPSILON);
    let cells = |db: f64| -> usize {
        let frac = ((db - min_db) / span).clamp(0.0, 1.0);
        (frac * width as f64).round() as usize
    };

    for ch in &snapshot.channels {
        let fill = cells(ch.rms_db);
        let peak = cells(ch.max_peak_db).min(width.saturating_sub(1));
        let bar: String = (0..width)
            .map(|i| match i {
                i if i < fill => '#',
                i if i == peak && ch.max_peak_db > min_db => '|',
                _ => ' ',
            })
            .collect();
        line.push_str(&format!(
            " [{bar}] {:>6.1}{}",
            ch.rms_db,
            if ch.clipped { 'C' } else { ' ' }
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use autorec_core::ipc::events::ChannelStatus;

    fn snapshot(rms_db: f64, max_peak_db: f64, clipped: bool, recording: bool) -> StatusSnapshot {
        StatusSnapshot {
            seq: 0,
            channels: vec![ChannelStatus {
                rms_db,
                peak_db: max_peak_db,
                max_rms_db: rms_db,
                max_peak_db,
                on: rms_db > -60.0,
                clipped,
            }],
            signal_on: rms_db > -60.0,
            clipping: clipped,
            recording,
            file: None,
        }
    }

    #[test]
    fn silent_channel_draws_an_empty_bar() {
        let line = render_line(&snapshot(-90.0, -90.0, false, false), -90.0, 0.0, 10);
        assert_eq!(line, "[---] [          ]  -90.0 ");
    }

    #[test]
    fn level_fills_proportionally_with_peak_marker() {
        let line = render_line(&snapshot(-45.0, -9.0, true, true), -90.0, 0.0, 10);
        assert_eq!(line, "[REC] [#####    |]  -45.0C");
    }
}
