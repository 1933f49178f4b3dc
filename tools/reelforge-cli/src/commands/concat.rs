//! Join timeline ranges with stream copy.

use std::path::PathBuf;
use std::sync::Arc;

use reelforge_common::config::AppConfig;
use reelforge_media::{ProcessRunner, SegmentConcatenator};
use reelforge_project_model::{segments_for, TimelineKind};

pub async fn run(
    config: AppConfig,
    timeline: PathBuf,
    media_dir: PathBuf,
    output: PathBuf,
) -> anyhow::Result<()> {
    let file = super::load_timeline(&timeline)?;
    let errors = file.validate();
    if !errors.is_empty() {
        for error in &errors {
            println!("  - {error}");
        }
        anyhow::bail!("Timeline has {} invalid entr(ies); nothing was joined", errors.len());
    }

    let video = file
        .get(TimelineKind::Video)
        .map(|t| segments_for(t, &media_dir))
        .unwrap_or_default();
    let audio = file
        .get(TimelineKind::Audio)
        .map(|t| segments_for(t, &media_dir))
        .unwrap_or_default();

    println!("Concatenating {} video / {} audio segment(s)", video.len(), audio.len());
    println!("  Output: {}", output.display());

    let runner = Arc::new(ProcessRunner::new(config.tools.clone()));
    let (ok, duration) = tokio::task::spawn_blocking(move || {
        SegmentConcatenator::new(runner).concatenate(&video, &audio, &output)
    })
    .await?;

    if ok {
        println!("Concatenation complete ({duration:.2}s)");
        Ok(())
    } else {
        Err(anyhow::anyhow!("Concatenation failed; see log for details"))
    }
}
