//! Media clip descriptors: one timeline entry's source range, kind, and
//! entry transition.
//!
//! Descriptors are the serializable, immutable-per-render description of a
//! timeline entry. The render pipeline only ever reads them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::timeline::ProjectError;

/// The kind of media an entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Photo,
    Audio,
    Text,
}

/// File extensions recognised as video when scanning a media folder.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// File extensions recognised as photos when scanning a media folder.
pub const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Photo => "photo",
            Self::Audio => "audio",
            Self::Text => "text",
        }
    }

    /// Detect a visual media kind from a filename's extension.
    ///
    /// Only video and photo files are detected; anything else is `None`.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = std::path::Path::new(filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Photo)
        } else {
            None
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition used when entering a clip from its predecessor.
///
/// The transition is a property of the edge between two clips and is
/// stored on the later clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    /// Hard cut.
    #[default]
    None,
    Fade,
    Slide,
    Zoom,
    Spin,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 5] = [
        TransitionKind::None,
        TransitionKind::Fade,
        TransitionKind::Slide,
        TransitionKind::Zoom,
        TransitionKind::Spin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fade => "fade",
            Self::Slide => "slide",
            Self::Zoom => "zoom",
            Self::Spin => "spin",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionKind {
    type Err = ProjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| ProjectError::ValidationError {
                message: format!("unknown transition '{s}'"),
            })
    }
}

/// One timeline entry. Identified by its source filename within a timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaClipDescriptor {
    /// In-point within the source, in seconds.
    pub start: f64,

    /// Out-point within the source, in seconds.
    pub end: f64,

    /// Transition used when entering this clip.
    #[serde(default, deserialize_with = "transition_or_none")]
    pub transition: TransitionKind,

    /// Media kind of the source.
    #[serde(rename = "type")]
    pub kind: MediaKind,

    /// Whether a variable-frame-rate source should be re-encoded to CFR.
    #[serde(
        rename = "video_resampling",
        default,
        deserialize_with = "flag_from_bool_or_int"
    )]
    pub resample: bool,
}

impl MediaClipDescriptor {
    pub fn new(kind: MediaKind, start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            transition: TransitionKind::None,
            kind,
            resample: false,
        }
    }

    pub fn with_transition(mut self, transition: TransitionKind) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_resample(mut self, resample: bool) -> Self {
        self.resample = resample;
        self
    }

    /// Requested length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end - self.start
    }

    /// Check the time-range invariants: both bounds finite and
    /// non-negative, `end > start`.
    pub fn validate(&self, name: &str) -> Result<(), ProjectError> {
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(ProjectError::ValidationError {
                message: format!("{name}: start/end must be finite"),
            });
        }
        if self.start < 0.0 || self.end < 0.0 {
            return Err(ProjectError::ValidationError {
                message: format!("{name}: start/end must be non-negative"),
            });
        }
        if self.end <= self.start {
            return Err(ProjectError::ValidationError {
                message: format!(
                    "{name}: end ({:.3}s) must be greater than start ({:.3}s)",
                    self.end, self.start
                ),
            });
        }
        Ok(())
    }

    /// The out-point bounded by a source's real duration.
    ///
    /// Returns the effective end and whether clamping happened.
    pub fn clamped_end(&self, source_duration_secs: f64) -> (f64, bool) {
        if self.end > source_duration_secs {
            (source_duration_secs, true)
        } else {
            (self.end, false)
        }
    }
}

fn transition_or_none<'de, D>(deserializer: D) -> Result<TransitionKind, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<TransitionKind>::deserialize(deserializer)?.unwrap_or_default())
}

fn flag_from_bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        None => false,
    })
}
