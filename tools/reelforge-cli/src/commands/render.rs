//! Render a timeline: final (with transitions) or fast preview.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use reelforge_common::config::AppConfig;
use reelforge_render_engine::{
    create_reel, ProgressCallback, ReelJob, RenderMode, RenderProgress, RenderStage,
};

pub async fn run(
    config: AppConfig,
    timeline: PathBuf,
    media_dir: PathBuf,
    output: PathBuf,
) -> anyhow::Result<()> {
    render(config, timeline, media_dir, output, RenderMode::Final).await
}

pub async fn run_preview(
    config: AppConfig,
    timeline: PathBuf,
    media_dir: PathBuf,
) -> anyhow::Result<()> {
    let output = config.work.preview_dir.clone();
    render(config, timeline, media_dir, output, RenderMode::Preview).await
}

async fn render(
    config: AppConfig,
    timeline: PathBuf,
    media_dir: PathBuf,
    output: PathBuf,
    mode: RenderMode,
) -> anyhow::Result<()> {
    println!("Rendering timeline: {}", timeline.display());
    let file = super::load_timeline(&timeline)?;

    let problems = file.validate();
    if !problems.is_empty() {
        for problem in &problems {
            println!("  - {problem}");
        }
        anyhow::bail!("{} invalid entr(ies) in {}", problems.len(), timeline.display());
    }

    println!("  Media: {}", media_dir.display());
    println!("  Mode: {mode:?}");
    println!(
        "  Canvas: {}x{} @ {}fps",
        config.render.width, config.render.height, config.render.fps
    );
    if mode == RenderMode::Final {
        println!("  Output: {}", output.display());
    }

    let job = ReelJob {
        timeline: file.render_snapshot(),
        media_dir,
        output,
        mode,
        config,
    };

    let progress_cb: ProgressCallback = Arc::new(|p: RenderProgress| {
        if p.stage == RenderStage::Encoding && p.total_frames > 0 {
            print!(
                "\r  Progress: {:.1}% ({}/{} frames)  ",
                p.progress * 100.0,
                p.frames_rendered,
                p.total_frames,
            );
            std::io::stdout().flush().ok();
        }
    });

    match create_reel(job, Some(progress_cb)).await {
        Ok(Some(path)) => {
            println!("\nRender complete: {}", path.display());
            Ok(())
        }
        Ok(None) => {
            println!("\nNothing rendered: no timeline entry could be loaded.");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Render failed: {e}")),
    }
}
