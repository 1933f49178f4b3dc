//! Frame-indexed clips.
//!
//! A [`Clip`] is a lazily evaluated tree of frame sources. Nothing is
//! decoded until a [`FrameStream`] is pulled; each stream owns the decoder
//! subprocesses it opens and reaps them when dropped.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use image::RgbImage;
use reelforge_common::error::{ReelError, ReelResult};
use reelforge_common::timing::frames_to_secs;
use reelforge_media::decode::{DecodeRequest, VideoDecoder};
use reelforge_media::mux::AudioSpan;
use reelforge_processing_core::frame::{fade_in_factor, fade_out_factor, scale_brightness};
use reelforge_processing_core::letterbox::resize_and_center;
use reelforge_project_model::TransitionKind;

/// Frames produced by a clip, in order.
pub type FrameStream = Box<dyn Iterator<Item = ReelResult<RgbImage>> + Send>;

#[derive(Debug, Clone)]
enum ClipSource {
    /// A time range of a video file, resampled by ffmpeg.
    Video {
        ffmpeg: PathBuf,
        request: DecodeRequest,
    },
    Still(Arc<RgbImage>),
    /// Materialized frames (transition windows).
    Frames(Arc<Vec<RgbImage>>),
    /// Frames `[start, start + frame_count)` of `inner`.
    Trim { inner: Box<Clip>, start: u64 },
    /// `inner` resized into this clip's size over a solid background.
    Fitted { inner: Box<Clip>, background: [u8; 3] },
    /// `inner` faded in from and out to black over the given frame counts.
    Faded {
        inner: Box<Clip>,
        fade_in: u64,
        fade_out: u64,
    },
    Concat(Vec<Clip>),
}

/// A fixed-rate, fixed-size sequence of frames with its audio.
#[derive(Debug, Clone)]
pub struct Clip {
    source: ClipSource,
    width: u32,
    height: u32,
    fps: u32,
    frame_count: u64,
    audio: Vec<AudioSpan>,
}

impl Clip {
    /// `[start_secs, end_secs)` of a video file whose frames decode to
    /// `size`. The file's audio over the same range is attached when
    /// `has_audio` is set.
    pub fn video(
        ffmpeg: impl Into<PathBuf>,
        path: impl Into<PathBuf>,
        start_secs: f64,
        end_secs: f64,
        fps: u32,
        size: (u32, u32),
        has_audio: bool,
    ) -> Self {
        let path = path.into();
        let duration = (end_secs - start_secs).max(0.0);
        let frame_count = reelforge_common::timing::frames_for_secs(duration, fps);
        let audio = if has_audio {
            vec![AudioSpan {
                path: path.clone(),
                source_start: start_secs,
                duration: frames_to_secs(frame_count, fps),
                offset: 0.0,
            }]
        } else {
            Vec::new()
        };
        Self {
            source: ClipSource::Video {
                ffmpeg: ffmpeg.into(),
                request: DecodeRequest {
                    path,
                    start_secs,
                    duration_secs: duration,
                    fps,
                    width: size.0,
                    height: size.1,
                },
            },
            width: size.0,
            height: size.1,
            fps,
            frame_count,
            audio,
        }
    }

    /// One image held for `frame_count` frames.
    pub fn still(image: RgbImage, fps: u32, frame_count: u64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            source: ClipSource::Still(Arc::new(image)),
            width,
            height,
            fps,
            frame_count,
            audio: Vec::new(),
        }
    }

    /// Already rendered frames. All frames must share one size.
    pub fn frames(frames: Vec<RgbImage>, fps: u32) -> ReelResult<Self> {
        let Some(first) = frames.first() else {
            return Err(ReelError::render("cannot build a clip from zero frames"));
        };
        let (width, height) = first.dimensions();
        if frames.iter().any(|f| f.dimensions() != (width, height)) {
            return Err(ReelError::render("frames in a clip must share one size"));
        }
        Ok(Self {
            width,
            height,
            fps,
            frame_count: frames.len() as u64,
            source: ClipSource::Frames(Arc::new(frames)),
            audio: Vec::new(),
        })
    }

    /// Join clips end to end. Audio spans are shifted to each part's start.
    pub fn concat(parts: Vec<Clip>) -> ReelResult<Self> {
        let parts: Vec<Clip> = parts.into_iter().filter(|c| c.frame_count > 0).collect();
        let Some(first) = parts.first() else {
            return Err(ReelError::render("cannot concatenate zero non-empty clips"));
        };
        let (width, height, fps) = (first.width, first.height, first.fps);
        if let Some(odd) = parts
            .iter()
            .find(|c| (c.width, c.height, c.fps) != (width, height, fps))
        {
            return Err(ReelError::render(format!(
                "cannot concatenate {}x{}@{} with {}x{}@{}",
                width, height, fps, odd.width, odd.height, odd.fps
            )));
        }
        let mut parts = parts;
        if parts.len() == 1 {
            if let Some(only) = parts.pop() {
                return Ok(only);
            }
        }

        let mut audio = Vec::new();
        let mut frame_count = 0;
        for part in &parts {
            let offset = frames_to_secs(frame_count, fps);
            audio.extend(part.audio.iter().map(|span| span.shifted(offset)));
            frame_count += part.frame_count;
        }
        Ok(Self {
            source: ClipSource::Concat(parts),
            width,
            height,
            fps,
            frame_count,
            audio,
        })
    }

    /// Frames `[from, to)` of this clip as a new clip, audio cut to match.
    pub fn trim(self, from: u64, to: u64) -> Self {
        let to = to.min(self.frame_count);
        let from = from.min(to);
        if from == 0 && to == self.frame_count {
            return self;
        }
        let (from_secs, to_secs) = (frames_to_secs(from, self.fps), frames_to_secs(to, self.fps));
        let audio = self
            .audio
            .iter()
            .filter_map(|span| span.window(from_secs, to_secs))
            .collect();
        Self {
            width: self.width,
            height: self.height,
            fps: self.fps,
            frame_count: to - from,
            audio,
            source: ClipSource::Trim {
                inner: Box::new(self),
                start: from,
            },
        }
    }

    /// Resize and center every frame into `size`. Duration and audio are
    /// kept.
    pub fn fitted(self, size: (u32, u32), background: [u8; 3]) -> Self {
        if self.size() == size {
            return self;
        }
        Self {
            width: size.0,
            height: size.1,
            fps: self.fps,
            frame_count: self.frame_count,
            audio: self.audio.clone(),
            source: ClipSource::Fitted {
                inner: Box::new(self),
                background,
            },
        }
    }

    /// Fade in from black over the first `fade_in` frames and out to black
    /// over the last `fade_out` frames.
    pub fn faded(self, fade_in: u64, fade_out: u64) -> Self {
        if fade_in == 0 && fade_out == 0 {
            return self;
        }
        let len = self.frame_count;
        Self {
            width: self.width,
            height: self.height,
            fps: self.fps,
            frame_count: self.frame_count,
            audio: self.audio.clone(),
            source: ClipSource::Faded {
                inner: Box::new(self),
                fade_in: fade_in.min(len),
                fade_out: fade_out.min(len),
            },
        }
    }

    /// Replace the clip's audio spans.
    pub fn with_audio(mut self, audio: Vec<AudioSpan>) -> Self {
        self.audio = audio;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn duration_secs(&self) -> f64 {
        frames_to_secs(self.frame_count, self.fps)
    }

    pub fn audio(&self) -> &[AudioSpan] {
        &self.audio
    }

    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }

    /// Stream every frame of the clip.
    pub fn stream(&self) -> ReelResult<FrameStream> {
        self.frames_between(0, self.frame_count)
    }

    /// Stream frames `[from, to)`. Exactly `to - from` frames are yielded:
    /// a source that runs short repeats its last frame.
    pub fn frames_between(&self, from: u64, to: u64) -> ReelResult<FrameStream> {
        let to = to.min(self.frame_count);
        let from = from.min(to);
        let count = to - from;
        let size = self.size();

        let inner: FrameStream = match &self.source {
            ClipSource::Video { ffmpeg, request } => {
                if count == 0 {
                    Box::new(std::iter::empty())
                } else {
                    let request = DecodeRequest {
                        start_secs: request.start_secs + frames_to_secs(from, self.fps),
                        duration_secs: frames_to_secs(count, self.fps),
                        ..request.clone()
                    };
                    Box::new(VideoDecoder::open(ffmpeg, request)?)
                }
            }
            ClipSource::Still(image) => {
                let image = Arc::clone(image);
                Box::new((0..count).map(move |_| Ok(image.as_ref().clone())))
            }
            ClipSource::Frames(frames) => {
                let frames = Arc::clone(frames);
                Box::new((from..to).map_while(move |i| frames.get(i as usize).cloned().map(Ok)))
            }
            ClipSource::Trim { inner, start } => {
                inner.frames_between(start + from, start + to)?
            }
            ClipSource::Fitted { inner, background } => {
                let background = *background;
                Box::new(
                    inner
                        .frames_between(from, to)?
                        .map(move |frame| frame.map(|f| resize_and_center(&f, size, background))),
                )
            }
            ClipSource::Faded {
                inner,
                fade_in,
                fade_out,
            } => {
                let (fade_in, fade_out, len) = (*fade_in, *fade_out, self.frame_count);
                Box::new(inner.frames_between(from, to)?.zip(from..to).map(
                    move |(frame, index)| {
                        frame.map(|f| {
                            let factor = fade_factor(index, len, fade_in, fade_out);
                            if factor >= 1.0 {
                                f
                            } else {
                                scale_brightness(&f, factor)
                            }
                        })
                    },
                ))
            }
            ClipSource::Concat(parts) => {
                let mut pending = VecDeque::new();
                let mut offset = 0u64;
                for part in parts {
                    let part_end = offset + part.frame_count;
                    let (lo, hi) = (from.max(offset), to.min(part_end));
                    if lo < hi {
                        pending.push_back((part.clone(), lo - offset, hi - offset));
                    }
                    offset = part_end;
                }
                Box::new(ConcatStream {
                    pending,
                    current: None,
                })
            }
        };

        Ok(Box::new(Padded {
            inner,
            remaining: count,
            last: None,
            size,
            done: false,
        }))
    }

    /// Release the clip and everything it holds.
    pub fn close(self) {
        tracing::debug!(
            frames = self.frame_count,
            width = self.width,
            height = self.height,
            "Closing clip"
        );
    }
}

fn fade_factor(index: u64, len: u64, fade_in: u64, fade_out: u64) -> f32 {
    let mut factor = 1.0;
    if fade_in > 0 && index < fade_in {
        factor *= fade_in_factor(index, fade_in);
    }
    if fade_out > 0 && index + fade_out >= len {
        factor *= fade_out_factor(index, len, fade_out);
    }
    factor
}

/// Lazily opens each part's stream as the previous one runs out.
struct ConcatStream {
    pending: VecDeque<(Clip, u64, u64)>,
    current: Option<FrameStream>,
}

impl Iterator for ConcatStream {
    type Item = ReelResult<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.next() {
                    Some(item) => return Some(item),
                    None => self.current = None,
                }
            }
            let (clip, from, to) = self.pending.pop_front()?;
            match clip.frames_between(from, to) {
                Ok(stream) => self.current = Some(stream),
                Err(e) => {
                    self.pending.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Yields exactly `remaining` frames, repeating the last one (or black)
/// when the source ends early. Stops after the first error.
struct Padded {
    inner: FrameStream,
    remaining: u64,
    last: Option<RgbImage>,
    size: (u32, u32),
    done: bool,
}

impl Iterator for Padded {
    type Item = ReelResult<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || self.done {
            return None;
        }
        self.remaining -= 1;
        match self.inner.next() {
            Some(Ok(frame)) => {
                self.last = Some(frame.clone());
                Some(Ok(frame))
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                let frame = self
                    .last
                    .clone()
                    .unwrap_or_else(|| RgbImage::new(self.size.0, self.size.1));
                if self.last.is_none() {
                    tracing::warn!("Clip source produced no frames; padding with black");
                }
                Some(Ok(frame))
            }
        }
    }
}

/// A loaded timeline entry ready for rendering.
#[derive(Debug, Clone)]
pub struct PreparedClip {
    pub clip: Clip,
    /// Transition used when entering this clip from the previous one.
    pub transition: TransitionKind,
}

impl PreparedClip {
    pub fn new(clip: Clip, transition: TransitionKind) -> Self {
        Self { clip, transition }
    }

    pub fn duration_secs(&self) -> f64 {
        self.clip.duration_secs()
    }

    pub fn close(self) {
        self.clip.close();
    }
}
