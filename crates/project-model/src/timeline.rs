//! Timeline files: the JSON document that describes a reel.
//!
//! A timeline file is a JSON object keyed by timeline kind
//! (`video_timeline`, `audio_timeline`, `text_timeline`). Each timeline is an
//! object keyed by source filename whose values are [`MediaClipDescriptor`]s.
//! Entry order is the order in the file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::descriptor::{MediaClipDescriptor, MediaKind};

/// Name of a timeline inside a timeline file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimelineKind {
    Video,
    Audio,
    Text,
}

impl TimelineKind {
    pub const ALL: [TimelineKind; 3] = [
        TimelineKind::Video,
        TimelineKind::Audio,
        TimelineKind::Text,
    ];

    /// JSON key used for this timeline.
    pub fn key(self) -> &'static str {
        match self {
            Self::Video => "video_timeline",
            Self::Audio => "audio_timeline",
            Self::Text => "text_timeline",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for TimelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One named entry of a timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    /// Source filename, relative to the media directory.
    pub name: String,
    pub descriptor: MediaClipDescriptor,
}

impl TimelineEntry {
    pub fn new(name: impl Into<String>, descriptor: MediaClipDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }
}

/// An ordered list of entries. Filenames are unique within a timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, replacing an existing entry with the same name in place.
    pub fn insert(&mut self, entry: TimelineEntry) {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MediaClipDescriptor> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.iter()
    }

    /// Sum of the requested durations of visual entries, in seconds.
    pub fn requested_visual_secs(&self) -> f64 {
        self.entries
            .iter()
            .filter(|e| matches!(e.descriptor.kind, MediaKind::Video | MediaKind::Photo))
            .map(|e| e.descriptor.duration_secs().max(0.0))
            .sum()
    }

    fn from_json(kind: TimelineKind, value: &Value, path: &Path) -> Result<Self, ProjectError> {
        let object = value
            .as_object()
            .ok_or_else(|| ProjectError::ValidationError {
                message: format!("{kind} in {} must be an object", path.display()),
            })?;

        let mut timeline = Timeline::new();
        for (name, raw) in object {
            let descriptor: MediaClipDescriptor = serde_json::from_value(raw.clone())
                .map_err(|e| ProjectError::ParseError {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            timeline.entries.push(TimelineEntry::new(name.clone(), descriptor));
        }
        Ok(timeline)
    }

    fn to_json(&self) -> Result<Value, serde_json::Error> {
        let mut object = Map::new();
        for entry in &self.entries {
            object.insert(entry.name.clone(), serde_json::to_value(&entry.descriptor)?);
        }
        Ok(Value::Object(object))
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a TimelineEntry;
    type IntoIter = std::slice::Iter<'a, TimelineEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// The complete in-memory representation of a timeline file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineFile {
    timelines: Vec<(TimelineKind, Timeline)>,
}

impl TimelineFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a timeline file from its JSON text.
    ///
    /// `path` is only used in error messages.
    pub fn parse(json: &str, path: &Path) -> Result<Self, ProjectError> {
        let value: Value = serde_json::from_str(json).map_err(|e| ProjectError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let object = value
            .as_object()
            .ok_or_else(|| ProjectError::ValidationError {
                message: format!("{} must contain a JSON object", path.display()),
            })?;

        let mut file = TimelineFile::new();
        for (key, raw) in object {
            let kind = TimelineKind::from_key(key).ok_or_else(|| ProjectError::ValidationError {
                message: format!("unknown timeline '{key}' in {}", path.display()),
            })?;
            file.set(kind, Timeline::from_json(kind, raw, path)?);
        }
        Ok(file)
    }

    /// Load a timeline file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ProjectError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&json, path)
    }

    /// Serialize to pretty-printed JSON, preserving entry order.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        let mut object = Map::new();
        for (kind, timeline) in &self.timelines {
            object.insert(kind.key().to_string(), timeline.to_json()?);
        }
        serde_json::to_string_pretty(&Value::Object(object))
    }

    /// Save to disk, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ProjectError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = self.to_json_string().map_err(|e| ProjectError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ProjectError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Build a video timeline from every recognised file in `folder`.
    ///
    /// Each video or photo gets `start = 0`, `end = 10`, no transition and no
    /// resampling. Unrecognised files are skipped with a warning. Files are
    /// taken in filename order.
    pub fn from_media_folder(folder: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let folder = folder.as_ref();
        let io_err = |e| ProjectError::IoError {
            path: folder.to_path_buf(),
            source: e,
        };

        let mut names = Vec::new();
        for dirent in std::fs::read_dir(folder).map_err(io_err)? {
            let dirent = dirent.map_err(io_err)?;
            if !dirent.path().is_file() {
                continue;
            }
            names.push(dirent.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        let mut timeline = Timeline::new();
        for name in names {
            match MediaKind::from_filename(&name) {
                Some(kind) => {
                    timeline.insert(TimelineEntry::new(
                        name,
                        MediaClipDescriptor::new(kind, 0.0, 10.0),
                    ));
                }
                None => tracing::warn!(file = %name, "Skipped unsupported file type"),
            }
        }

        let mut file = TimelineFile::new();
        file.set(TimelineKind::Video, timeline);
        Ok(file)
    }

    pub fn get(&self, kind: TimelineKind) -> Option<&Timeline> {
        self.timelines
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, t)| t)
    }

    /// Replace (or add) the timeline of the given kind.
    pub fn set(&mut self, kind: TimelineKind, timeline: Timeline) {
        match self.timelines.iter_mut().find(|(k, _)| *k == kind) {
            Some(slot) => slot.1 = timeline,
            None => self.timelines.push((kind, timeline)),
        }
    }

    pub fn timelines(&self) -> impl Iterator<Item = (TimelineKind, &Timeline)> {
        self.timelines.iter().map(|(k, t)| (*k, t))
    }

    /// The frozen, ordered entry list a render works from: the video
    /// timeline followed by the audio timeline.
    pub fn render_snapshot(&self) -> Timeline {
        let mut snapshot = Timeline::new();
        for kind in [TimelineKind::Video, TimelineKind::Audio] {
            if let Some(timeline) = self.get(kind) {
                snapshot.entries.extend(timeline.entries.iter().cloned());
            }
        }
        snapshot
    }

    /// Check every descriptor's time range. Returns one message per problem.
    pub fn validate(&self) -> Vec<String> {
        self.timelines()
            .flat_map(|(_, timeline)| timeline.iter())
            .filter_map(|entry| entry.descriptor.validate(&entry.name).err())
            .map(|e| e.to_string())
            .collect()
    }

    /// Validate that all referenced source files exist under `media_dir`.
    pub fn validate_sources(&self, media_dir: impl AsRef<Path>) -> Vec<String> {
        let media_dir = media_dir.as_ref();
        let mut errors = vec![];
        for (kind, timeline) in self.timelines() {
            for entry in timeline {
                if entry.descriptor.kind == MediaKind::Text {
                    continue;
                }
                if !media_dir.join(&entry.name).exists() {
                    errors.push(format!("{kind} source missing: {}", entry.name));
                }
            }
        }
        errors
    }
}

/// Errors that can occur when working with timeline files.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid timeline: {message}")]
    ValidationError { message: String },
}
