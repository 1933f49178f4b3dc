//! Top-level reel creation: load, render, clean up.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reelforge_common::config::AppConfig;
use reelforge_common::error::{ReelError, ReelResult};
use reelforge_media::framerate::FrameRateNormalizer;
use reelforge_media::runner::{ProcessRunner, ToolRunner};
use reelforge_project_model::Timeline;

use crate::loader::EntryLoader;
use crate::orchestrator::{ProgressCallback, ProgressReporter, RenderOrchestrator, RenderStage};

/// What a render produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Per-clip files plus a stream-copied join in the preview directory.
    Preview,
    /// One frame-accurate file with transitions.
    #[default]
    Final,
}

/// One reel to build.
#[derive(Debug, Clone)]
pub struct ReelJob {
    /// Frozen timeline snapshot (visual entries, then audio).
    pub timeline: Timeline,

    /// Directory entry names are resolved against.
    pub media_dir: PathBuf,

    /// Output file for [`RenderMode::Final`].
    pub output: PathBuf,

    pub mode: RenderMode,

    pub config: AppConfig,
}

/// Build a reel on the blocking thread pool.
///
/// Returns `Ok(None)` when no entry could be loaded.
pub async fn create_reel(
    job: ReelJob,
    progress: Option<ProgressCallback>,
) -> ReelResult<Option<PathBuf>> {
    tokio::task::spawn_blocking(move || {
        let runner: Arc<dyn ToolRunner> = Arc::new(ProcessRunner::new(job.config.tools.clone()));
        render_reel(&job, runner, progress)
    })
    .await
    .map_err(|e| ReelError::render(format!("render task failed: {e}")))?
}

/// Build a reel with the given tool runner.
///
/// Temporary CFR files are removed before loading and again once the
/// render finishes, whether or not it succeeded.
pub fn render_reel(
    job: &ReelJob,
    runner: Arc<dyn ToolRunner>,
    progress: Option<ProgressCallback>,
) -> ReelResult<Option<PathBuf>> {
    let reporter = ProgressReporter::new(progress.clone());
    reporter.stage(RenderStage::Preparing, 0.0);
    tracing::info!(
        entries = job.timeline.len(),
        media_dir = %job.media_dir.display(),
        mode = ?job.mode,
        "Creating reel"
    );

    let config = &job.config;
    let mut normalizer = FrameRateNormalizer::new(Arc::clone(&runner), &config.work.temp_dir)
        .with_probe_timeout(Duration::from_secs(config.tools.probe_timeout_secs));
    normalizer.cleanup_temp_files();

    let result = load_and_render(job, runner, &mut normalizer, &reporter, progress);

    normalizer.cleanup_temp_files();
    if let Err(e) = &result {
        reporter.stage(RenderStage::Failed, 0.0);
        tracing::error!(error = %e, "Reel creation failed");
    }
    result
}

fn load_and_render(
    job: &ReelJob,
    runner: Arc<dyn ToolRunner>,
    normalizer: &mut FrameRateNormalizer,
    reporter: &ProgressReporter,
    progress: Option<ProgressCallback>,
) -> ReelResult<Option<PathBuf>> {
    let config = &job.config;
    reporter.stage(RenderStage::Loading, 0.0);
    let loaded = EntryLoader::new(
        Arc::clone(&runner),
        normalizer,
        config.render.clone(),
        &config.tools.ffmpeg,
    )
    .load_timeline(&job.timeline, &job.media_dir)?;

    if loaded.is_empty() {
        tracing::info!(skipped = loaded.skipped.len(), "No clips to render");
        return Ok(None);
    }

    let orchestrator = RenderOrchestrator::new(
        runner,
        &config.tools,
        config.render.clone(),
        &config.work.preview_dir,
    )
    .with_progress(progress);
    let output = match job.mode {
        RenderMode::Preview => orchestrator.preview(loaded.clips, loaded.audio.as_ref())?,
        RenderMode::Final => {
            orchestrator.final_render(&job.output, loaded.clips, loaded.audio.as_ref())?
        }
    };
    Ok(Some(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelforge_media::testing::ScriptedRunner;
    use reelforge_project_model::{MediaClipDescriptor, MediaKind, TimelineEntry};

    fn job(timeline: Timeline, media_dir: PathBuf, work: &std::path::Path) -> ReelJob {
        let mut config = AppConfig::default();
        config.work.temp_dir = work.join("temp");
        config.work.preview_dir = work.join("preview");
        ReelJob {
            timeline,
            media_dir,
            output: work.join("out.mp4"),
            mode: RenderMode::Final,
            config,
        }
    }

    #[test]
    fn test_no_loadable_clips_yields_none() {
        let work = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let mut timeline = Timeline::new();
        timeline.insert(TimelineEntry::new(
            "missing.mp4",
            MediaClipDescriptor::new(MediaKind::Video, 0.0, 3.0),
        ));
        let job = job(timeline, work.path().join("media"), work.path());

        let result = render_reel(&job, runner.clone(), None).unwrap();
        assert!(result.is_none());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_unsupported_entry_fails_the_reel() {
        let work = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::default());
        let mut timeline = Timeline::new();
        timeline.insert(TimelineEntry::new(
            "caption.txt",
            MediaClipDescriptor::new(MediaKind::Text, 0.0, 3.0),
        ));
        let job = job(timeline, work.path().to_path_buf(), work.path());

        let err = render_reel(&job, runner, None).unwrap_err();
        assert!(matches!(err, ReelError::UnsupportedMediaKind { .. }));
    }
}
