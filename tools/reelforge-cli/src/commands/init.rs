//! Create a timeline file from a media folder.

use std::path::PathBuf;

use reelforge_project_model::{TimelineFile, TimelineKind};

pub fn run(folder: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    println!("Scanning media folder: {}", folder.display());

    let file = TimelineFile::from_media_folder(&folder)
        .map_err(|e| anyhow::anyhow!("Failed to scan folder: {e}"))?;
    file.save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write timeline: {e}"))?;

    let entries = file.get(TimelineKind::Video).map(|t| t.len()).unwrap_or(0);
    println!("Timeline written: {}", output.display());
    println!("  Entries: {entries}");
    println!("  Each entry: 0s to 10s, no transition, no resampling");

    Ok(())
}
