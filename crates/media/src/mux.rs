//! Attaching audio to an encoded, silent video.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelforge_common::error::ReelResult;
use reelforge_common::timing::ffmpeg_timestamp;

use crate::concat::move_file;
use crate::runner::{Invocation, ToolRunner};

/// Sample rate of every AAC track this crate writes. Parts joined with
/// stream copy must agree on it.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Channel count of every AAC track this crate writes.
pub const AUDIO_CHANNELS: u32 = 2;

fn aac_output_args() -> [String; 8] {
    [
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-ar".to_string(),
        AUDIO_SAMPLE_RATE.to_string(),
        "-ac".to_string(),
        AUDIO_CHANNELS.to_string(),
    ]
}

/// A piece of a source file's audio placed on a clip's own timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSpan {
    pub path: PathBuf,
    /// Where the piece starts in the source file, in seconds.
    pub source_start: f64,
    pub duration: f64,
    /// Where the piece starts on the clip's timeline, in seconds.
    pub offset: f64,
}

impl AudioSpan {
    pub fn end(&self) -> f64 {
        self.offset + self.duration
    }

    /// Move the span later on the timeline by `secs`.
    pub fn shifted(&self, secs: f64) -> Self {
        Self {
            offset: self.offset + secs,
            ..self.clone()
        }
    }

    /// The part of this span inside `[from, to)` of the timeline, rebased so
    /// that `from` becomes zero.
    pub fn window(&self, from: f64, to: f64) -> Option<Self> {
        let start = self.offset.max(from);
        let end = self.end().min(to);
        if end - start <= 1e-9 {
            return None;
        }
        Some(Self {
            path: self.path.clone(),
            source_start: self.source_start + (start - self.offset),
            duration: end - start,
            offset: start - from,
        })
    }
}

/// Audio to put under a video.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioPlan {
    Silent,
    /// One external file, read from `start` for `duration` seconds.
    External {
        path: PathBuf,
        start: f64,
        duration: f64,
    },
    /// Spans mixed together, cut at `duration`.
    Spans {
        spans: Vec<AudioSpan>,
        duration: f64,
    },
    /// A generated silent track of `duration` seconds, for files that are
    /// later stream-copied next to files with real audio.
    SilentTrack { duration: f64 },
}

pub fn external_audio_invocation(
    video: &Path,
    audio: &Path,
    start: f64,
    duration: f64,
    output: &Path,
) -> Invocation {
    Invocation::ffmpeg(
        [
            "-hide_banner".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            video.display().to_string(),
            "-ss".to_string(),
            ffmpeg_timestamp(start),
            "-t".to_string(),
            ffmpeg_timestamp(duration),
            "-i".to_string(),
            audio.display().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
        ]
        .into_iter()
        .chain(aac_output_args())
        .chain([output.display().to_string()]),
    )
}

pub fn silent_track_invocation(video: &Path, duration: f64, output: &Path) -> Invocation {
    let source = format!("anullsrc=channel_layout=stereo:sample_rate={AUDIO_SAMPLE_RATE}");
    Invocation::ffmpeg(
        [
            "-hide_banner".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            video.display().to_string(),
            "-f".to_string(),
            "lavfi".to_string(),
            "-t".to_string(),
            ffmpeg_timestamp(duration),
            "-i".to_string(),
            source,
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
        ]
        .into_iter()
        .chain(aac_output_args())
        .chain(["-shortest".to_string(), output.display().to_string()]),
    )
}

/// Filter graph placing every span at its offset and mixing them
/// without level normalization.
pub fn span_filter_graph(spans: &[AudioSpan], duration: f64) -> String {
    let mut graph = String::new();
    let mut labels = String::new();
    for (i, span) in spans.iter().enumerate() {
        let delay_ms = (span.offset.max(0.0) * 1000.0).round() as u64;
        graph.push_str(&format!(
            "[{input}:a]atrim=start={start}:duration={dur},asetpts=PTS-STARTPTS,adelay=delays={delay_ms}:all=1[a{i}];",
            input = i + 1,
            start = ffmpeg_timestamp(span.source_start),
            dur = ffmpeg_timestamp(span.duration),
        ));
        labels.push_str(&format!("[a{i}]"));
    }
    graph.push_str(&format!(
        "{labels}amix=inputs={}:normalize=0:duration=longest,atrim=duration={}[aout]",
        spans.len(),
        ffmpeg_timestamp(duration)
    ));
    graph
}

pub fn span_mix_invocation(
    video: &Path,
    spans: &[AudioSpan],
    duration: f64,
    output: &Path,
) -> Invocation {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        video.display().to_string(),
    ];
    for span in spans {
        args.push("-i".to_string());
        args.push(span.path.display().to_string());
    }
    args.extend([
        "-filter_complex".to_string(),
        span_filter_graph(spans, duration),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "[aout]".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
    ]);
    args.extend(aac_output_args());
    args.push(output.display().to_string());
    Invocation::ffmpeg(args)
}

/// Combines a silent video with its [`AudioPlan`] into the final file.
pub struct AudioMuxer {
    runner: Arc<dyn ToolRunner>,
}

impl AudioMuxer {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    /// Write `output` from `video` plus `plan`. `video` is consumed.
    pub fn attach(&self, video: &Path, plan: &AudioPlan, output: &Path) -> ReelResult<()> {
        match plan {
            AudioPlan::Silent => {
                tracing::debug!(output = %output.display(), "No audio to attach");
                move_file(video, output)
            }
            AudioPlan::External {
                path,
                start,
                duration,
            } => {
                tracing::info!(audio = %path.display(), start, duration, "Attaching external audio");
                self.runner.run_checked(&external_audio_invocation(
                    video, path, *start, *duration, output,
                ))?;
                remove_intermediate(video);
                Ok(())
            }
            AudioPlan::Spans { spans, .. } if spans.is_empty() => move_file(video, output),
            AudioPlan::SilentTrack { duration } => {
                tracing::debug!(output = %output.display(), duration, "Attaching silent track");
                self.runner
                    .run_checked(&silent_track_invocation(video, *duration, output))?;
                remove_intermediate(video);
                Ok(())
            }
            AudioPlan::Spans { spans, duration } => {
                tracing::info!(spans = spans.len(), duration, "Mixing clip audio");
                self.runner
                    .run_checked(&span_mix_invocation(video, spans, *duration, output))?;
                remove_intermediate(video);
                Ok(())
            }
        }
    }
}

fn remove_intermediate(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove intermediate file");
        }
    }
}
