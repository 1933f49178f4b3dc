//! Preview and final rendering of loaded clips.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelforge_common::config::{RenderDefaults, ToolPaths};
use reelforge_common::error::{ReelError, ReelResult};
use reelforge_common::timing::Stopwatch;
use reelforge_media::codec::{preferred_codec, RenderQuality, VideoCodec};
use reelforge_media::concat::SegmentConcatenator;
use reelforge_media::encode::{EncodeSettings, FfmpegEncoder};
use reelforge_media::mux::{AudioMuxer, AudioPlan};
use reelforge_media::runner::ToolRunner;
use reelforge_project_model::Segment;

use crate::clip::{Clip, PreparedClip};
use crate::loader::AudioTrack;
use crate::transition::TransitionEngine;

/// File name of the joined preview inside the preview directory.
pub const PREVIEW_FILE: &str = "preview_fast.mp4";

/// Progress callback for rendering.
pub type ProgressCallback = Arc<dyn Fn(RenderProgress) + Send + Sync>;

/// Render progress report.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    pub stage: RenderStage,

    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames encoded so far.
    pub frames_rendered: u64,

    /// Total frames to encode.
    pub total_frames: u64,
}

/// Stages of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Preparing,
    Loading,
    Compositing,
    Encoding,
    Muxing,
    Complete,
    Failed,
}

#[derive(Clone, Default)]
pub(crate) struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    pub(crate) fn stage(&self, stage: RenderStage, progress: f64) {
        self.frames(stage, progress, 0, 0);
    }

    pub(crate) fn frames(&self, stage: RenderStage, progress: f64, done: u64, total: u64) {
        if let Some(cb) = &self.callback {
            cb(RenderProgress {
                stage,
                progress: progress.clamp(0.0, 1.0),
                frames_rendered: done,
                total_frames: total,
            });
        }
    }
}

/// Renders prepared clips into a preview directory or a final file.
pub struct RenderOrchestrator {
    runner: Arc<dyn ToolRunner>,
    ffmpeg: PathBuf,
    defaults: RenderDefaults,
    preview_dir: PathBuf,
    codec: VideoCodec,
    progress: ProgressReporter,
}

impl RenderOrchestrator {
    /// Create an orchestrator, probing for the hardware encoder once.
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        tools: &ToolPaths,
        defaults: RenderDefaults,
        preview_dir: impl Into<PathBuf>,
    ) -> Self {
        let codec = preferred_codec(runner.as_ref());
        Self::with_codec(runner, tools, defaults, preview_dir, codec)
    }

    /// Create an orchestrator with a fixed encoder.
    pub fn with_codec(
        runner: Arc<dyn ToolRunner>,
        tools: &ToolPaths,
        defaults: RenderDefaults,
        preview_dir: impl Into<PathBuf>,
        codec: VideoCodec,
    ) -> Self {
        Self {
            runner,
            ffmpeg: tools.ffmpeg.clone(),
            defaults,
            preview_dir: preview_dir.into(),
            codec,
            progress: ProgressReporter::default(),
        }
    }

    pub fn with_progress(mut self, callback: Option<ProgressCallback>) -> Self {
        self.progress = ProgressReporter::new(callback);
        self
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }

    pub fn preview_dir(&self) -> &Path {
        &self.preview_dir
    }

    /// Fit a clip into the render canvas over the background color.
    pub fn resize_and_center(&self, clip: Clip) -> Clip {
        clip.fitted(self.defaults.size(), self.defaults.background)
    }

    /// Render each clip to `NN_preview.mp4` in parallel, then join them
    /// (with the audio track, if any) into [`PREVIEW_FILE`].
    ///
    /// Cuts use stream copy, so they land on keyframes and may differ from
    /// the final render by a fraction of a second.
    pub fn preview(
        &self,
        clips: Vec<PreparedClip>,
        audio: Option<&AudioTrack>,
    ) -> ReelResult<PathBuf> {
        if clips.is_empty() {
            return Err(ReelError::render("nothing to preview"));
        }
        let watch = Stopwatch::start();
        self.progress.stage(RenderStage::Preparing, 0.0);
        recreate_dir(&self.preview_dir)?;

        let clips: Vec<Clip> = clips
            .into_iter()
            .map(|prepared| self.resize_and_center(prepared.clip))
            .collect();
        let total_secs: f64 = clips.iter().map(Clip::duration_secs).sum();

        self.progress.stage(RenderStage::Encoding, 0.0);
        let results: Vec<ReelResult<(PathBuf, f64)>> = std::thread::scope(|scope| {
            let handles: Vec<_> = clips
                .iter()
                .enumerate()
                .map(|(i, clip)| {
                    let output = self.preview_dir.join(format!("{:02}_preview.mp4", i + 1));
                    scope.spawn(move || {
                        self.encode_clip_file(clip, RenderQuality::Preview, &output)
                            .map(|path| (path, clip.duration_secs()))
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(ReelError::render("preview worker panicked")))
                })
                .collect()
        });
        for clip in clips {
            clip.close();
        }

        let mut segments = Vec::with_capacity(results.len());
        for result in results {
            let (path, secs) = result.inspect_err(|_| {
                self.progress.stage(RenderStage::Failed, 0.0);
            })?;
            segments.push(Segment::new(path, 0.0, secs));
        }

        self.progress.stage(RenderStage::Muxing, 0.9);
        let audio_segments: Vec<Segment> = audio
            .map(|track| Segment::new(&track.path, track.start, track.start + total_secs))
            .into_iter()
            .collect();
        let output = self.preview_dir.join(PREVIEW_FILE);
        let duration = SegmentConcatenator::new(Arc::clone(&self.runner))
            .try_concatenate(&segments, &audio_segments, &output)
            .inspect_err(|_| self.progress.stage(RenderStage::Failed, 0.0))?;

        self.progress.stage(RenderStage::Complete, 1.0);
        tracing::info!(
            output = %output.display(),
            clips = segments.len(),
            duration,
            elapsed_ms = watch.elapsed_ms() as u64,
            "Preview ready"
        );
        Ok(output)
    }

    /// Composite every clip through its entry transition and encode the
    /// result to `output`.
    ///
    /// Audio comes from the external track when one is given, otherwise from
    /// the clips themselves.
    pub fn final_render(
        &self,
        output: &Path,
        clips: Vec<PreparedClip>,
        audio: Option<&AudioTrack>,
    ) -> ReelResult<PathBuf> {
        let watch = Stopwatch::start();
        self.progress.stage(RenderStage::Compositing, 0.0);
        let composite = self.composite(clips)?;
        let result = self.encode_composite(output, &composite, audio);
        composite.close();

        match &result {
            Ok(path) => {
                self.progress.stage(RenderStage::Complete, 1.0);
                tracing::info!(
                    output = %path.display(),
                    elapsed_ms = watch.elapsed_ms() as u64,
                    "Final render complete"
                );
            }
            Err(e) => {
                self.progress.stage(RenderStage::Failed, 0.0);
                tracing::error!(output = %output.display(), error = %e, "Final render failed");
            }
        }
        result
    }

    /// Left-fold the clips through the transition engine, entering each
    /// clip with its own transition.
    pub fn composite(&self, clips: Vec<PreparedClip>) -> ReelResult<Clip> {
        let engine = TransitionEngine::new(&self.defaults);
        let mut clips = clips.into_iter();
        let first = clips
            .next()
            .ok_or_else(|| ReelError::render("nothing to render"))?;
        let mut composite = self.resize_and_center(first.clip);
        for next in clips {
            let incoming = self.resize_and_center(next.clip);
            composite = engine.apply(
                next.transition,
                composite,
                incoming,
                self.defaults.transition_secs,
            )?;
        }
        tracing::info!(
            frames = composite.frame_count(),
            duration = composite.duration_secs(),
            "Composite built"
        );
        Ok(composite)
    }

    fn encode_composite(
        &self,
        output: &Path,
        composite: &Clip,
        audio: Option<&AudioTrack>,
    ) -> ReelResult<PathBuf> {
        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let scratch = tempfile::Builder::new()
            .prefix(".reelforge-render-")
            .tempdir_in(parent)?;

        let silent = scratch.path().join("video.mp4");
        self.encode_frames(composite, RenderQuality::Final, &silent)?;

        self.progress.stage(RenderStage::Muxing, 0.95);
        let duration = composite.duration_secs();
        let plan = match audio {
            Some(track) => AudioPlan::External {
                path: track.path.clone(),
                start: track.start,
                duration,
            },
            None => AudioPlan::Spans {
                spans: composite.audio().to_vec(),
                duration,
            },
        };
        AudioMuxer::new(Arc::clone(&self.runner)).attach(&silent, &plan, output)?;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            tracing::warn!(
                path = %scratch_path.display(),
                error = %e,
                "Failed to remove render scratch directory"
            );
        }
        Ok(output.to_path_buf())
    }

    /// Encode one clip with its own audio into `output`.
    fn encode_clip_file(
        &self,
        clip: &Clip,
        quality: RenderQuality,
        output: &Path,
    ) -> ReelResult<PathBuf> {
        let silent = output.with_extension("video.mp4");
        self.encode_frames(clip, quality, &silent)?;
        let plan = preview_audio_plan(clip);
        AudioMuxer::new(Arc::clone(&self.runner)).attach(&silent, &plan, output)?;
        Ok(output.to_path_buf())
    }

    fn encode_frames(&self, clip: &Clip, quality: RenderQuality, output: &Path) -> ReelResult<()> {
        let settings = EncodeSettings {
            width: clip.width(),
            height: clip.height(),
            fps: clip.fps(),
            codec: self.codec,
            quality,
            output: output.to_path_buf(),
        };
        let total = clip.frame_count();
        let report_every = (clip.fps() as u64).max(1);
        tracing::debug!(
            output = %output.display(),
            frames = total,
            codec = %self.codec,
            ?quality,
            "Encoding clip"
        );

        let mut encoder = FfmpegEncoder::start(&self.ffmpeg, settings)?;
        for frame in clip.stream()? {
            encoder.encode_frame(&frame?)?;
            let done = encoder.frames_written();
            if done % report_every == 0 || done == total {
                self.progress.frames(
                    RenderStage::Encoding,
                    done as f64 / total.max(1) as f64,
                    done,
                    total,
                );
            }
        }
        encoder.finish()?;
        Ok(())
    }
}

/// Audio for one preview part. Every part carries exactly one audio stream,
/// since the parts are joined by stream copy.
fn preview_audio_plan(clip: &Clip) -> AudioPlan {
    let duration = clip.duration_secs();
    if clip.has_audio() {
        AudioPlan::Spans {
            spans: clip.audio().to_vec(),
            duration,
        }
    } else {
        AudioPlan::SilentTrack { duration }
    }
}

fn recreate_dir(dir: &Path) -> ReelResult<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use reelforge_media::testing::ScriptedRunner;
    use reelforge_project_model::TransitionKind;
    use std::sync::Mutex;

    fn orchestrator(runner: ScriptedRunner, preview_dir: &Path) -> RenderOrchestrator {
        canvas_orchestrator(runner, preview_dir, 8, 16)
    }

    fn canvas_orchestrator(
        runner: ScriptedRunner,
        preview_dir: &Path,
        width: u32,
        height: u32,
    ) -> RenderOrchestrator {
        let defaults = RenderDefaults {
            width,
            height,
            ..RenderDefaults::default()
        };
        RenderOrchestrator::with_codec(
            Arc::new(runner),
            &ToolPaths::default(),
            defaults,
            preview_dir,
            VideoCodec::Libx264,
        )
    }

    fn still(w: u32, h: u32, frames: u64, transition: TransitionKind) -> PreparedClip {
        PreparedClip::new(
            Clip::still(RgbImage::from_pixel(w, h, Rgb([90, 90, 90])), 30, frames),
            transition,
        )
    }

    #[test]
    fn test_resize_and_center_fits_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(ScriptedRunner::default(), dir.path());
        let fitted = orch.resize_and_center(still(16, 9, 3, TransitionKind::None).clip);
        assert_eq!(fitted.size(), (8, 16));
        assert_eq!(fitted.frame_count(), 3);
    }

    #[test]
    fn test_composite_uses_later_clip_transition() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(ScriptedRunner::default(), dir.path());
        let clips = vec![
            still(8, 16, 60, TransitionKind::Slide),
            still(8, 16, 60, TransitionKind::None),
            still(8, 16, 60, TransitionKind::Zoom),
        ];
        // Slide on the first clip is never used; none then zoom over 30 frames.
        let composite = orch.composite(clips).unwrap();
        assert_eq!(composite.frame_count(), 150);
    }

    #[test]
    fn test_composite_of_nothing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(ScriptedRunner::default(), dir.path());
        assert!(orch.composite(Vec::new()).is_err());
    }

    #[test]
    fn test_preview_of_nothing_fails_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let preview_dir = dir.path().join("preview");
        let orch = orchestrator(ScriptedRunner::default(), &preview_dir);
        assert!(orch.preview(Vec::new(), None).is_err());
        assert!(!preview_dir.exists());
    }

    #[test]
    fn test_preview_fails_when_any_clip_fails_to_encode() {
        let dir = tempfile::tempdir().unwrap();
        let preview_dir = dir.path().join("preview");
        let runner = ScriptedRunner::default();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let callback: ProgressCallback = Arc::new(move |p: RenderProgress| {
            sink.lock().unwrap().push(p.stage);
        });
        // An odd canvas is rejected by the encoder before ffmpeg starts.
        let orch = canvas_orchestrator(runner.clone(), &preview_dir, 7, 16)
            .with_progress(Some(callback));

        let clips = vec![
            still(8, 16, 3, TransitionKind::None),
            still(8, 16, 3, TransitionKind::Fade),
        ];
        let err = orch.preview(clips, None).unwrap_err();

        assert!(matches!(err, ReelError::Encode { .. }));
        assert_eq!(stages.lock().unwrap().last(), Some(&RenderStage::Failed));
        assert!(runner.calls().is_empty(), "nothing may be joined after a failure");
        assert!(!preview_dir.join(PREVIEW_FILE).exists());
    }

    #[test]
    fn test_preview_parts_always_carry_audio() {
        let silent = still(8, 16, 30, TransitionKind::None).clip;
        assert_eq!(
            preview_audio_plan(&silent),
            AudioPlan::SilentTrack { duration: 1.0 }
        );

        let span = reelforge_media::AudioSpan {
            path: PathBuf::from("a.mp4"),
            source_start: 0.0,
            duration: 1.0,
            offset: 0.0,
        };
        let voiced = still(8, 16, 30, TransitionKind::None)
            .clip
            .with_audio(vec![span.clone()]);
        assert_eq!(
            preview_audio_plan(&voiced),
            AudioPlan::Spans {
                spans: vec![span],
                duration: 1.0
            }
        );
    }

    #[test]
    fn test_progress_reporter_clamps() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |p: RenderProgress| {
            sink.lock().unwrap().push((p.stage, p.progress));
        });
        let reporter = ProgressReporter::new(Some(callback));
        reporter.stage(RenderStage::Encoding, 1.5);
        reporter.frames(RenderStage::Encoding, 0.5, 15, 30);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (RenderStage::Encoding, 1.0));
        assert_eq!(seen[1], (RenderStage::Encoding, 0.5));
    }

    #[test]
    fn test_recreate_dir_clears_old_previews() {
        let dir = tempfile::tempdir().unwrap();
        let preview = dir.path().join("preview");
        std::fs::create_dir_all(&preview).unwrap();
        std::fs::write(preview.join("01_preview.mp4"), b"old").unwrap();
        recreate_dir(&preview).unwrap();
        assert!(preview.exists());
        assert_eq!(std::fs::read_dir(&preview).unwrap().count(), 0);
    }
}
