//! Trim segments handed to the fast concatenation path.

use std::path::{Path, PathBuf};

use crate::timeline::{ProjectError, Timeline, TimelineEntry};

/// A `[start, end)` range of one media file, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub path: PathBuf,
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(path: impl Into<PathBuf>, start: f64, end: f64) -> Self {
        Self {
            path: path.into(),
            start,
            end,
        }
    }

    /// Segment covering a timeline entry's range of `media_dir/name`.
    pub fn from_entry(entry: &TimelineEntry, media_dir: &Path) -> Self {
        Self::new(
            media_dir.join(&entry.name),
            entry.descriptor.start,
            entry.descriptor.end,
        )
    }

    pub fn duration_secs(&self) -> f64 {
        self.end - self.start
    }

    pub fn validate(&self) -> Result<(), ProjectError> {
        if !(self.start >= 0.0 && self.end > self.start) {
            return Err(ProjectError::ValidationError {
                message: format!(
                    "segment {} has an empty or inverted range [{}, {})",
                    self.path.display(),
                    self.start,
                    self.end
                ),
            });
        }
        Ok(())
    }
}

/// Segments for every entry of `timeline`, in order.
pub fn segments_for(timeline: &Timeline, media_dir: &Path) -> Vec<Segment> {
    timeline
        .iter()
        .map(|entry| Segment::from_entry(entry, media_dir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{MediaClipDescriptor, MediaKind};

    #[test]
    fn test_segments_follow_timeline_order() {
        let mut timeline = Timeline::new();
        timeline.insert(TimelineEntry::new(
            "b.mp4",
            MediaClipDescriptor::new(MediaKind::Video, 1.0, 3.5),
        ));
        timeline.insert(TimelineEntry::new(
            "a.mp4",
            MediaClipDescriptor::new(MediaKind::Video, 0.0, 2.0),
        ));

        let segments = segments_for(&timeline, Path::new("/media"));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].path, PathBuf::from("/media/b.mp4"));
        assert!((segments[0].duration_secs() - 2.5).abs() < 1e-9);
        assert_eq!(segments[1].path, PathBuf::from("/media/a.mp4"));
    }

    #[test]
    fn test_validate_rejects_empty_range() {
        assert!(Segment::new("a.mp4", 0.0, 1.0).validate().is_ok());
        assert!(Segment::new("a.mp4", 2.0, 2.0).validate().is_err());
        assert!(Segment::new("a.mp4", f64::NAN, 2.0).validate().is_err());
    }
}
