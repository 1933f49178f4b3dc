//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scratch and output directories.
    pub work: WorkConfig,

    /// Default render parameters.
    pub render: RenderDefaults,

    /// External tool locations.
    pub tools: ToolPaths,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Scratch and output directories used by a render.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkConfig {
    /// Directory for normalized (constant frame rate) copies of sources.
    pub temp_dir: PathBuf,

    /// Directory receiving per-clip preview files and the combined preview.
    pub preview_dir: PathBuf,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// Length of every transition window in seconds.
    pub transition_secs: f64,

    /// Entries that would push the reel past this length are skipped.
    pub max_reel_secs: f64,

    /// Width in pixels of the alpha-blended seam of the slide transition.
    pub slide_blend_width: u32,

    /// Scaling profile of the zoom transition.
    pub zoom_direction: ZoomDirection,

    /// Fill behind letterboxed photos.
    pub photo_background: PhotoBackground,

    /// Solid background color behind resized clips.
    pub background: [u8; 3],
}

/// Scaling profile for the zoom transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomDirection {
    /// Outgoing clip zooms out of 1.2x while the incoming clip grows from 0.8x.
    #[default]
    InOut,
    /// Outgoing clip grows from 0.8x while the incoming clip shrinks from 1.2x.
    OutIn,
    /// Both clips zoom in from 1.0x to 1.2x.
    In,
    /// Both clips zoom out from 1.2x to 1.0x.
    Out,
}

/// Fill used behind a photo framed into the vertical canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoBackground {
    #[default]
    Black,
    /// A blurred, stretched copy of the photo itself.
    Blurred,
}

/// Locations of the external encoder and probe binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,

    /// How long the frame-rate probe may run before it reports "unknown".
    pub probe_timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelforge_media=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            preview_dir: PathBuf::from("preview"),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            transition_secs: 1.0,
            max_reel_secs: 90.0,
            slide_blend_width: 0,
            zoom_direction: ZoomDirection::InOut,
            photo_background: PhotoBackground::Black,
            background: [0, 0, 0],
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            probe_timeout_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl RenderDefaults {
    /// Output size as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelforge").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_vertical_reel() {
        let config = AppConfig::default();
        assert_eq!(config.render.size(), (1080, 1920));
        assert_eq!(config.render.fps, 30);
        assert!((config.render.max_reel_secs - 90.0).abs() < 1e-9);
        assert_eq!(config.render.zoom_direction, ZoomDirection::InOut);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"render": {"fps": 24, "photo_background": "blurred"}}"#)
                .unwrap();
        assert_eq!(config.render.fps, 24);
        assert_eq!(config.render.width, 1080);
        assert_eq!(config.render.photo_background, PhotoBackground::Blurred);
        assert_eq!(config.tools.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_save_and_load_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.render.transition_secs = 0.5;
        config.work.temp_dir = PathBuf::from("/var/tmp/reelforge");
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert!((loaded.render.transition_secs - 0.5).abs() < 1e-9);
        assert_eq!(loaded.work.temp_dir, PathBuf::from("/var/tmp/reelforge"));
    }

    #[test]
    fn test_unparseable_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.render.fps, 30);
    }
}
