//! Check external tools and encoder selection.

use reelforge_common::config::AppConfig;
use reelforge_media::{command_exists, preferred_codec, ProcessRunner};

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    println!("ReelForge System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;
    for (name, path) in [("ffmpeg", &config.tools.ffmpeg), ("ffprobe", &config.tools.ffprobe)] {
        if command_exists(path) {
            println!("[OK] {name}: {}", path.display());
        } else {
            println!("[MISSING] {name}: {} not found", path.display());
            all_ok = false;
        }
    }

    if all_ok {
        let runner = ProcessRunner::new(config.tools.clone());
        let codec = tokio::task::spawn_blocking(move || preferred_codec(&runner)).await?;
        let kind = if codec.is_hardware() { "hardware" } else { "software" };
        println!("[OK] Encoder: {codec} ({kind})");
    }

    println!();
    println!("Render defaults:");
    println!(
        "  Canvas: {}x{} @ {}fps",
        config.render.width, config.render.height, config.render.fps
    );
    println!("  Transition: {:.2}s", config.render.transition_secs);
    println!("  Max reel length: {:.0}s", config.render.max_reel_secs);
    println!("  Temp dir: {}", config.work.temp_dir.display());
    println!("  Preview dir: {}", config.work.preview_dir.display());

    println!();
    if all_ok {
        println!("All required tools are available. ReelForge is ready.");
    } else {
        println!("Install ffmpeg (which provides ffprobe) or set tool paths in the config.");
    }

    Ok(())
}
