pub mod check;
pub mod concat;
pub mod info;
pub mod init;
pub mod render;
pub mod validate;

use std::path::Path;

use reelforge_project_model::TimelineFile;

pub(crate) fn load_timeline(path: &Path) -> anyhow::Result<TimelineFile> {
    TimelineFile::load(path).map_err(|e| anyhow::anyhow!("Failed to load timeline: {e}"))
}
