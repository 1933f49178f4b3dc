//! Turning timeline entries into clips.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelforge_common::config::RenderDefaults;
use reelforge_common::error::{ReelError, ReelResult};
use reelforge_common::timing::frames_for_secs;
use reelforge_media::framerate::FrameRateNormalizer;
use reelforge_media::probe::probe_media;
use reelforge_media::runner::ToolRunner;
use reelforge_processing_core::letterbox::frame_photo;
use reelforge_project_model::{MediaClipDescriptor, MediaKind, Timeline};

use crate::clip::{Clip, PreparedClip};

/// The external audio track of a reel.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    /// Offset into the audio file where the reel's audio starts.
    pub start: f64,
}

/// Everything loaded from one timeline snapshot.
#[derive(Debug, Default)]
pub struct LoadedTimeline {
    pub clips: Vec<PreparedClip>,
    pub audio: Option<AudioTrack>,
    /// Names of entries that failed to load or did not fit.
    pub skipped: Vec<String>,
}

impl LoadedTimeline {
    pub fn total_secs(&self) -> f64 {
        self.clips.iter().map(PreparedClip::duration_secs).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

/// Loads entries against a media directory.
///
/// Borrows the render's [`FrameRateNormalizer`] so every CFR file it
/// produces is cleaned up with the render.
pub struct EntryLoader<'a> {
    runner: Arc<dyn ToolRunner>,
    normalizer: &'a mut FrameRateNormalizer,
    defaults: RenderDefaults,
    ffmpeg: PathBuf,
}

impl<'a> EntryLoader<'a> {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        normalizer: &'a mut FrameRateNormalizer,
        defaults: RenderDefaults,
        ffmpeg: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            normalizer,
            defaults,
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Load one visual entry.
    ///
    /// Audio and text entries always fail with
    /// [`ReelError::UnsupportedMediaKind`] before touching the filesystem.
    pub fn load(
        &mut self,
        name: &str,
        descriptor: &MediaClipDescriptor,
        media_dir: &Path,
    ) -> ReelResult<PreparedClip> {
        match descriptor.kind {
            MediaKind::Video | MediaKind::Photo => {}
            other => return Err(ReelError::unsupported_kind(other.as_str())),
        }
        descriptor
            .validate(name)
            .map_err(|e| ReelError::invalid_descriptor(name, e.to_string()))?;

        let full_path = media_dir.join(name);
        if !full_path.exists() {
            return Err(ReelError::FileNotFound { path: full_path });
        }

        let clip = match descriptor.kind {
            MediaKind::Photo => self.load_photo(name, descriptor, &full_path)?,
            _ => self.load_video(name, descriptor, &full_path)?,
        };
        tracing::info!(
            entry = name,
            kind = %descriptor.kind,
            frames = clip.frame_count(),
            duration = clip.duration_secs(),
            "Loaded entry"
        );
        Ok(PreparedClip::new(clip, descriptor.transition))
    }

    fn load_video(
        &mut self,
        name: &str,
        descriptor: &MediaClipDescriptor,
        full_path: &Path,
    ) -> ReelResult<Clip> {
        let mut source = full_path.to_path_buf();
        if descriptor.resample {
            let check = self.normalizer.is_variable_framerate(&source);
            match (check.variable, check.average_fps) {
                (true, Some(fps)) if fps > 0 => {
                    source = self.normalizer.normalize(&source, fps)?;
                }
                (true, _) => {
                    tracing::warn!(entry = name, "Variable frame rate without a usable average");
                }
                _ => {}
            }
        }

        let info = probe_media(self.runner.as_ref(), &source)?;
        if info.width == 0 || info.height == 0 {
            return Err(ReelError::probe(format!("{name}: no video stream")));
        }

        let (end, clamped) = descriptor.clamped_end(info.duration_secs);
        if clamped {
            tracing::warn!(
                entry = name,
                requested = descriptor.end,
                available = info.duration_secs,
                "Clip end exceeds source duration; clamping"
            );
        }
        if end <= descriptor.start {
            return Err(ReelError::invalid_descriptor(
                name,
                format!(
                    "start {:.3}s is past the source duration {:.3}s",
                    descriptor.start, info.duration_secs
                ),
            ));
        }
        self.check_length(name, end - descriptor.start)?;

        Ok(Clip::video(
            self.ffmpeg.clone(),
            source,
            descriptor.start,
            end,
            self.defaults.fps,
            (info.width, info.height),
            info.has_audio,
        ))
    }

    fn load_photo(
        &self,
        name: &str,
        descriptor: &MediaClipDescriptor,
        full_path: &Path,
    ) -> ReelResult<Clip> {
        let frame_count = self.check_length(name, descriptor.duration_secs())?;
        let photo = image::open(full_path)?;
        let framed = frame_photo(&photo, self.defaults.size(), self.defaults.photo_background);
        Ok(Clip::still(framed, self.defaults.fps, frame_count))
    }

    fn check_length(&self, name: &str, secs: f64) -> ReelResult<u64> {
        let frames = frames_for_secs(secs, self.defaults.fps);
        if frames == 0 {
            return Err(ReelError::invalid_descriptor(
                name,
                "shorter than one frame",
            ));
        }
        Ok(frames)
    }

    /// Load a timeline snapshot in order.
    ///
    /// The audio entry becomes the external audio track (the last one wins).
    /// Entries that fail to load are logged and skipped, except for
    /// unsupported kinds, which abort the whole load. Entries that would push
    /// the reel past `max_reel_secs` are skipped.
    pub fn load_timeline(
        &mut self,
        timeline: &Timeline,
        media_dir: &Path,
    ) -> ReelResult<LoadedTimeline> {
        let mut loaded = LoadedTimeline::default();
        let mut total_secs = 0.0;

        for entry in timeline {
            if entry.descriptor.kind == MediaKind::Audio {
                if let Some(previous) = &loaded.audio {
                    tracing::warn!(
                        replaced = %previous.path.display(),
                        entry = %entry.name,
                        "Multiple audio entries; using the last"
                    );
                }
                loaded.audio = Some(AudioTrack {
                    path: media_dir.join(&entry.name),
                    start: entry.descriptor.start.max(0.0),
                });
                continue;
            }

            match self.load(&entry.name, &entry.descriptor, media_dir) {
                Ok(clip) => {
                    let secs = clip.duration_secs();
                    if total_secs + secs > self.defaults.max_reel_secs + 1e-9 {
                        tracing::info!(
                            entry = %entry.name,
                            total = total_secs,
                            limit = self.defaults.max_reel_secs,
                            "Entry exceeds the reel length limit; skipping"
                        );
                        clip.close();
                        loaded.skipped.push(entry.name.clone());
                        continue;
                    }
                    total_secs += secs;
                    loaded.clips.push(clip);
                }
                Err(e) if e.is_fatal_for_batch() => {
                    tracing::error!(entry = %entry.name, error = %e, "Aborting timeline load");
                    for clip in loaded.clips.drain(..) {
                        clip.close();
                    }
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(entry = %entry.name, error = %e, "Skipping entry");
                    loaded.skipped.push(entry.name.clone());
                }
            }
        }

        tracing::info!(
            clips = loaded.clips.len(),
            skipped = loaded.skipped.len(),
            total_secs,
            "Timeline loaded"
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use reelforge_media::runner::{Tool, ToolOutput};
    use reelforge_media::testing::ScriptedRunner;
    use reelforge_project_model::{TimelineEntry, TransitionKind};

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"codec_type": "video", "width": 1920, "height": 1080},
            {"codec_type": "audio"}
        ],
        "format": {"duration": "12.0"}
    }"#;

    fn scripted() -> ScriptedRunner {
        ScriptedRunner::new(|inv| match inv.tool {
            Tool::Ffprobe if inv.args.iter().any(|a| a == "json") => Ok(ToolOutput::ok(PROBE_JSON)),
            Tool::Ffprobe => Ok(ToolOutput::ok("30000/1001\n29.97/1\n")),
            _ => Ok(reelforge_media::testing::touch_output(inv)),
        })
    }

    fn media_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"").unwrap();
        RgbImage::from_pixel(400, 300, Rgb([255, 0, 0]))
            .save(dir.path().join("photo.png"))
            .unwrap();
        dir
    }

    fn entry(name: &str, kind: MediaKind, start: f64, end: f64) -> TimelineEntry {
        TimelineEntry::new(name, MediaClipDescriptor::new(kind, start, end))
    }

    #[test]
    fn test_unsupported_kinds_fail_before_io() {
        let runner = Arc::new(scripted());
        let temp = tempfile::tempdir().unwrap();
        let mut normalizer = FrameRateNormalizer::new(runner.clone(), temp.path());
        let mut loader = EntryLoader::new(
            runner.clone(),
            &mut normalizer,
            RenderDefaults::default(),
            "ffmpeg",
        );
        for kind in [MediaKind::Audio, MediaKind::Text] {
            let err = loader
                .load(
                    "missing.file",
                    &MediaClipDescriptor::new(kind, 0.0, 1.0),
                    Path::new("/nonexistent"),
                )
                .unwrap_err();
            assert!(matches!(err, ReelError::UnsupportedMediaKind { .. }));
        }
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_video_end_is_clamped_to_source() {
        let runner = Arc::new(scripted());
        let dir = media_dir();
        let temp = tempfile::tempdir().unwrap();
        let mut normalizer = FrameRateNormalizer::new(runner.clone(), temp.path());
        let mut loader =
            EntryLoader::new(runner.clone(), &mut normalizer, RenderDefaults::default(), "ffmpeg");

        let descriptor = MediaClipDescriptor::new(MediaKind::Video, 2.0, 20.0)
            .with_transition(TransitionKind::Fade);
        let prepared = loader.load("clip.mp4", &descriptor, dir.path()).unwrap();
        assert_eq!(prepared.transition, TransitionKind::Fade);
        assert_eq!(prepared.clip.frame_count(), 300);
        assert_eq!(prepared.clip.size(), (1920, 1080));
        assert_eq!(prepared.clip.audio().len(), 1);
        assert_eq!(runner.count_for(&Tool::Ffmpeg), 0);
    }

    #[test]
    fn test_resample_normalizes_variable_sources_once() {
        let runner = Arc::new(scripted());
        let dir = media_dir();
        let temp = tempfile::tempdir().unwrap();
        let mut normalizer = FrameRateNormalizer::new(runner.clone(), temp.path());
        {
            let mut loader = EntryLoader::new(
                runner.clone(),
                &mut normalizer,
                RenderDefaults::default(),
                "ffmpeg",
            );
            let descriptor =
                MediaClipDescriptor::new(MediaKind::Video, 0.0, 5.0).with_resample(true);
            loader.load("clip.mp4", &descriptor, dir.path()).unwrap();
            loader.load("clip.mp4", &descriptor, dir.path()).unwrap();
        }
        assert_eq!(runner.count_with_arg("cfr"), 1);
        assert_eq!(runner.count_with_arg("29"), 1);
        assert_eq!(normalizer.tracked_files().len(), 1);
    }

    #[test]
    fn test_photo_is_framed_into_canvas() {
        let runner = Arc::new(scripted());
        let dir = media_dir();
        let temp = tempfile::tempdir().unwrap();
        let mut normalizer = FrameRateNormalizer::new(runner.clone(), temp.path());
        let mut loader =
            EntryLoader::new(runner.clone(), &mut normalizer, RenderDefaults::default(), "ffmpeg");

        let prepared = loader
            .load(
                "photo.png",
                &MediaClipDescriptor::new(MediaKind::Photo, 0.0, 2.5),
                dir.path(),
            )
            .unwrap();
        assert_eq!(prepared.clip.size(), (1080, 1920));
        assert_eq!(prepared.clip.frame_count(), 75);
        let frame = prepared.clip.stream().unwrap().next().unwrap().unwrap();
        assert_eq!(frame.get_pixel(540, 960), &Rgb([255, 0, 0]));
        assert_eq!(frame.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_load_timeline_skips_failures_and_collects_audio() {
        let runner = Arc::new(scripted());
        let dir = media_dir();
        let temp = tempfile::tempdir().unwrap();
        let mut normalizer = FrameRateNormalizer::new(runner.clone(), temp.path());
        let mut loader =
            EntryLoader::new(runner.clone(), &mut normalizer, RenderDefaults::default(), "ffmpeg");

        let mut timeline = Timeline::new();
        timeline.insert(entry("clip.mp4", MediaKind::Video, 0.0, 4.0));
        timeline.insert(entry("gone.mp4", MediaKind::Video, 0.0, 4.0));
        timeline.insert(entry("photo.png", MediaKind::Photo, 0.0, 3.0));
        timeline.insert(entry("song.mp3", MediaKind::Audio, 7.5, 60.0));

        let loaded = loader.load_timeline(&timeline, dir.path()).unwrap();
        assert_eq!(loaded.clips.len(), 2);
        assert_eq!(loaded.skipped, vec!["gone.mp4".to_string()]);
        assert!((loaded.total_secs() - 7.0).abs() < 1e-9);
        let audio = loaded.audio.unwrap();
        assert_eq!(audio.path, dir.path().join("song.mp3"));
        assert_eq!(audio.start, 7.5);
    }

    #[test]
    fn test_load_timeline_enforces_length_limit() {
        let runner = Arc::new(scripted());
        let dir = media_dir();
        let temp = tempfile::tempdir().unwrap();
        let mut normalizer = FrameRateNormalizer::new(runner.clone(), temp.path());
        let defaults = RenderDefaults {
            max_reel_secs: 10.0,
            ..RenderDefaults::default()
        };
        let mut loader = EntryLoader::new(runner.clone(), &mut normalizer, defaults, "ffmpeg");

        let mut timeline = Timeline::new();
        timeline.insert(entry("clip.mp4", MediaKind::Video, 0.0, 8.0));
        timeline.insert(entry("photo.png", MediaKind::Photo, 0.0, 3.0));

        let loaded = loader.load_timeline(&timeline, dir.path()).unwrap();
        assert_eq!(loaded.clips.len(), 1);
        assert_eq!(loaded.skipped, vec!["photo.png".to_string()]);
    }

    #[test]
    fn test_text_entry_aborts_timeline() {
        let runner = Arc::new(scripted());
        let dir = media_dir();
        let temp = tempfile::tempdir().unwrap();
        let mut normalizer = FrameRateNormalizer::new(runner.clone(), temp.path());
        let mut loader =
            EntryLoader::new(runner.clone(), &mut normalizer, RenderDefaults::default(), "ffmpeg");

        let mut timeline = Timeline::new();
        timeline.insert(entry("photo.png", MediaKind::Photo, 0.0, 3.0));
        timeline.insert(entry("caption.txt", MediaKind::Text, 0.0, 3.0));

        let err = loader.load_timeline(&timeline, dir.path()).unwrap_err();
        assert!(err.is_fatal_for_batch());
    }
}
