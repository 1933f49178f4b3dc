//! Fast stream-copy path: trim segments in parallel, join them with the
//! concat demuxer, and mux the video and audio results.
//!
//! Stream-copy cuts snap to the nearest preceding keyframe, so the cut
//! points can differ slightly from a frame-accurate render of the same
//! timeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelforge_common::error::{ReelError, ReelResult};
use reelforge_common::timing::ffmpeg_timestamp;
use reelforge_project_model::segment::Segment;

use crate::pool::{try_run_indexed, worker_count};
use crate::runner::{Invocation, ToolRunner};

/// Default intermediate container when the output has no extension.
const DEFAULT_PART_EXTENSION: &str = "mkv";

/// Container used for trimmed audio parts.
const AUDIO_PART_EXTENSION: &str = "mka";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackKind {
    Video,
    Audio,
}

struct TrimJob<'a> {
    segment: &'a Segment,
    part: PathBuf,
    track: TrackKind,
}

/// Trims and concatenates segments through ffmpeg with stream copy.
pub struct SegmentConcatenator {
    runner: Arc<dyn ToolRunner>,
    workers: Option<usize>,
}

impl SegmentConcatenator {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            runner,
            workers: None,
        }
    }

    /// Override the worker count (defaults to [`worker_count`]).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    /// Concatenate, reporting `(success, total video duration)`.
    ///
    /// Failures are logged and reported as `(false, 0.0)`.
    pub fn concatenate(&self, video: &[Segment], audio: &[Segment], output: &Path) -> (bool, f64) {
        match self.try_concatenate(video, audio, output) {
            Ok(duration) => (true, duration),
            Err(e) => {
                tracing::error!(output = %output.display(), error = %e, "Concatenation failed");
                (false, 0.0)
            }
        }
    }

    /// Concatenate `video` (and `audio`, when non-empty) into `output`.
    ///
    /// Every segment must satisfy `0 <= start < end`; an invalid one fails
    /// the call before any subprocess runs. Returns the summed
    /// `end - start` of the video segments.
    pub fn try_concatenate(
        &self,
        video: &[Segment],
        audio: &[Segment],
        output: &Path,
    ) -> ReelResult<f64> {
        if video.is_empty() {
            return Err(ReelError::EmptySegments);
        }
        for segment in video.iter().chain(audio) {
            segment.validate().map_err(|e| ReelError::InvalidDescriptor {
                name: segment.path.display().to_string(),
                message: e.to_string(),
            })?;
        }

        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let scratch = tempfile::Builder::new()
            .prefix(".reelforge-concat-")
            .tempdir_in(parent)?;

        let result = self.run_in(scratch.path(), video, audio, output);

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!(
                path = %scratch_path.display(),
                error = %e,
                "Failed to remove concat scratch directory"
            );
        }
        result
    }

    fn run_in(
        &self,
        scratch: &Path,
        video: &[Segment],
        audio: &[Segment],
        output: &Path,
    ) -> ReelResult<f64> {
        let video_ext = output
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_PART_EXTENSION);

        let jobs: Vec<TrimJob<'_>> = video
            .iter()
            .enumerate()
            .map(|(i, segment)| TrimJob {
                segment,
                part: scratch.join(format!("video_{i:04}.{video_ext}")),
                track: TrackKind::Video,
            })
            .chain(audio.iter().enumerate().map(|(i, segment)| TrimJob {
                segment,
                part: scratch.join(format!("audio_{i:04}.{AUDIO_PART_EXTENSION}")),
                track: TrackKind::Audio,
            }))
            .collect();

        let workers = self.workers.unwrap_or_else(|| worker_count(jobs.len()));
        tracing::info!(
            video_segments = video.len(),
            audio_segments = audio.len(),
            workers,
            "Trimming segments"
        );

        let runner = self.runner.as_ref();
        try_run_indexed(&jobs, workers, |job| {
            runner
                .run_checked(&trim_invocation(job.segment, &job.part))
                .map(|_| ())
                .inspect_err(|e| {
                    tracing::error!(
                        segment = %job.segment.path.display(),
                        error = %e,
                        "Segment trim failed"
                    );
                })
        })?;

        let parts = |track: TrackKind| -> Vec<&Path> {
            jobs.iter()
                .filter(|j| j.track == track)
                .map(|j| j.part.as_path())
                .collect()
        };

        let joined_video = scratch.join(format!("joined_video.{video_ext}"));
        self.concat_parts(scratch, "video", &parts(TrackKind::Video), &joined_video)?;

        if audio.is_empty() {
            move_file(&joined_video, output)?;
        } else {
            let joined_audio = scratch.join(format!("joined_audio.{AUDIO_PART_EXTENSION}"));
            self.concat_parts(scratch, "audio", &parts(TrackKind::Audio), &joined_audio)?;
            self.runner
                .run_checked(&mux_invocation(&joined_video, &joined_audio, output))?;
        }

        let total: f64 = video.iter().map(Segment::duration_secs).sum();
        tracing::info!(output = %output.display(), duration_secs = total, "Concatenated segments");
        Ok(total)
    }

    fn concat_parts(
        &self,
        scratch: &Path,
        label: &str,
        parts: &[&Path],
        joined: &Path,
    ) -> ReelResult<()> {
        let list = scratch.join(format!("{label}_list.txt"));
        std::fs::write(&list, concat_list(parts))?;
        self.runner.run_checked(&concat_invocation(&list, joined))?;
        Ok(())
    }
}

/// Body of an ffmpeg concat-demuxer list file.
pub fn concat_list(parts: &[&Path]) -> String {
    parts
        .iter()
        .map(|p| format!("file '{}'\n", p.display().to_string().replace('\'', r"'\''")))
        .collect()
}

pub fn trim_invocation(segment: &Segment, part: &Path) -> Invocation {
    Invocation::ffmpeg([
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        ffmpeg_timestamp(segment.start),
        "-to".to_string(),
        ffmpeg_timestamp(segment.end),
        "-i".to_string(),
        segment.path.display().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        part.display().to_string(),
    ])
}

pub fn concat_invocation(list: &Path, joined: &Path) -> Invocation {
    Invocation::ffmpeg([
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list.display().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        joined.display().to_string(),
    ])
}

pub fn mux_invocation(video: &Path, audio: &Path, output: &Path) -> Invocation {
    Invocation::ffmpeg([
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        video.display().to_string(),
        "-i".to_string(),
        audio.display().to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        output.display().to_string(),
    ])
}

/// Rename, falling back to copy + remove across filesystems.
pub fn move_file(from: &Path, to: &Path) -> ReelResult<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    if let Err(e) = std::fs::remove_file(from) {
        tracing::warn!(path = %from.display(), error = %e, "Failed to remove moved file");
    }
    Ok(())
}
