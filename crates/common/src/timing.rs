//! Frame and time conversion utilities.
//!
//! Every clip in a render runs at one constant frame rate, so positions on
//! the timeline are tracked as frame indices and converted to seconds only
//! at the subprocess boundary. This module provides:
//! - Seconds <-> frame conversions
//! - A stopwatch for per-stage timing in logs

use std::time::Instant;

/// Number of frames covering `secs` at `fps`, rounded to the nearest frame.
///
/// Negative and non-finite durations map to zero frames.
pub fn frames_for_secs(secs: f64, fps: u32) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * fps as f64).round() as u64
}

/// Duration in seconds of `frames` frames at `fps`.
pub fn frames_to_secs(frames: u64, fps: u32) -> f64 {
    if fps == 0 {
        return 0.0;
    }
    frames as f64 / fps as f64
}

/// Format a time in seconds for ffmpeg `-ss`/`-to`/`-t` arguments.
pub fn ffmpeg_timestamp(secs: f64) -> String {
    format!("{:.6}", secs.max(0.0))
}

/// Wall-clock stopwatch used to report how long a pipeline stage took.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Start a stopwatch anchored to now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the stopwatch started.
    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    /// Seconds elapsed since the stopwatch started.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}
