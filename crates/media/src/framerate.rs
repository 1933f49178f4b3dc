//! Variable-to-constant frame-rate normalization with a per-render cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reelforge_common::error::{ReelError, ReelResult};

use crate::probe::{probe_frame_rate, FrameRateCheck};
use crate::runner::{Invocation, ToolRunner};

/// Re-encodes VFR sources to CFR copies in a temp directory.
///
/// One instance belongs to one render. Each source path is re-encoded at
/// most once per instance; every produced (or reused) file is tracked and
/// deleted by [`FrameRateNormalizer::cleanup_temp_files`] or on drop.
pub struct FrameRateNormalizer {
    runner: Arc<dyn ToolRunner>,
    temp_dir: PathBuf,
    probe_timeout: Duration,
    cache: HashMap<PathBuf, PathBuf>,
    temp_files: Vec<PathBuf>,
}

impl FrameRateNormalizer {
    pub fn new(runner: Arc<dyn ToolRunner>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            temp_dir: temp_dir.into(),
            probe_timeout: Duration::from_secs(10),
            cache: HashMap::new(),
            temp_files: Vec::new(),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Files that will be removed on cleanup.
    pub fn tracked_files(&self) -> &[PathBuf] {
        &self.temp_files
    }

    /// Probe `path` for a variable frame rate.
    pub fn is_variable_framerate(&self, path: &Path) -> FrameRateCheck {
        probe_frame_rate(self.runner.as_ref(), path, self.probe_timeout)
    }

    /// Deterministic CFR output path for `source` at `fps`.
    pub fn output_path_for(&self, source: &Path, fps: u32) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip".to_string());
        self.temp_dir.join(format!("{stem}_cfr_{fps}fps.mp4"))
    }

    /// Return a constant-frame-rate copy of `source` at `fps`.
    ///
    /// A cached result is returned as is. An existing file with the
    /// deterministic output name is reused without re-encoding.
    pub fn normalize(&mut self, source: &Path, fps: u32) -> ReelResult<PathBuf> {
        if let Some(cached) = self.cache.get(source) {
            tracing::debug!(source = %source.display(), cfr = %cached.display(), "CFR cache hit");
            return Ok(cached.clone());
        }
        if fps == 0 {
            return Err(ReelError::invalid_descriptor(
                source.display().to_string(),
                "cannot normalize to 0 fps",
            ));
        }

        std::fs::create_dir_all(&self.temp_dir)?;
        let output = self.output_path_for(source, fps);

        if output.exists() {
            tracing::info!(
                source = %source.display(),
                cfr = %output.display(),
                "Reusing existing CFR file"
            );
        } else {
            tracing::info!(source = %source.display(), fps, "Re-encoding to constant frame rate");
            let invocation = Invocation::ffmpeg([
                "-hide_banner".to_string(),
                "-i".to_string(),
                source.display().to_string(),
                "-r".to_string(),
                fps.to_string(),
                "-vsync".to_string(),
                "cfr".to_string(),
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
                "-c:v".to_string(),
                "libx264".to_string(),
                "-preset".to_string(),
                "slow".to_string(),
                "-crf".to_string(),
                "18".to_string(),
                "-c:a".to_string(),
                "aac".to_string(),
                "-b:a".to_string(),
                "192k".to_string(),
                "-y".to_string(),
                output.display().to_string(),
            ]);
            self.runner.run_checked(&invocation)?;
        }

        self.cache.insert(source.to_path_buf(), output.clone());
        self.temp_files.push(output.clone());
        Ok(output)
    }

    /// Delete every tracked temp file. Missing files are ignored.
    pub fn cleanup_temp_files(&mut self) {
        for path in self.temp_files.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file")
                }
            }
        }
        self.cache.clear();
    }
}

impl Drop for FrameRateNormalizer {
    fn drop(&mut self) {
        self.cleanup_temp_files();
    }
}
