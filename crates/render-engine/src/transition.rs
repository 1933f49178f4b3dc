//! Joining two clips through a transition.
//!
//! Transitions are a closed set dispatched by `match`. Fade works by
//! wrapping the clips; slide, zoom and spin materialize only the window
//! frames and stream everything else.

use image::RgbImage;
use reelforge_common::config::{RenderDefaults, ZoomDirection};
use reelforge_common::error::{ReelError, ReelResult};
use reelforge_common::timing::frames_to_secs;
use reelforge_processing_core::transitions::{slide_frame, spin_pair, window_frames, zoom_pair};
use reelforge_project_model::TransitionKind;

use crate::clip::Clip;

/// Frame layout of a joined clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionLayout {
    /// Frames taken from the outgoing clip alone.
    pub pre: u64,
    /// Transition frames.
    pub window: u64,
    /// Frames after the window.
    pub post: u64,
    /// Output frame where the incoming clip's own timeline starts.
    pub b_start: u64,
}

impl TransitionLayout {
    /// Layout for joining `len_a` and `len_b` frames with a `window`-frame
    /// transition. `window` is clamped to both lengths.
    pub fn for_kind(kind: TransitionKind, len_a: u64, len_b: u64, window: u64) -> Self {
        let n = window.min(len_a).min(len_b);
        match kind {
            TransitionKind::None => Self {
                pre: len_a,
                window: 0,
                post: len_b,
                b_start: len_a,
            },
            TransitionKind::Fade => Self {
                pre: len_a - n,
                window: n,
                post: len_b,
                b_start: len_a,
            },
            TransitionKind::Slide | TransitionKind::Zoom | TransitionKind::Spin => Self {
                pre: len_a - n,
                window: n,
                post: len_b - n,
                b_start: len_a - n,
            },
        }
    }

    pub fn total(&self) -> u64 {
        self.pre + self.window + self.post
    }
}

pub struct TransitionEngine {
    slide_blend_width: u32,
    zoom_direction: ZoomDirection,
}

impl TransitionEngine {
    pub fn new(defaults: &RenderDefaults) -> Self {
        Self {
            slide_blend_width: defaults.slide_blend_width,
            zoom_direction: defaults.zoom_direction,
        }
    }

    /// Join `a` then `b`, entering `b` through `kind` over `duration_secs`.
    pub fn apply(
        &self,
        kind: TransitionKind,
        a: Clip,
        b: Clip,
        duration_secs: f64,
    ) -> ReelResult<Clip> {
        if a.size() != b.size() {
            return Err(ReelError::render(format!(
                "transition between {}x{} and {}x{} clips",
                a.width(),
                a.height(),
                b.width(),
                b.height()
            )));
        }
        if a.fps() != b.fps() {
            return Err(ReelError::render(format!(
                "transition between {} fps and {} fps clips",
                a.fps(),
                b.fps()
            )));
        }

        let fps = a.fps();
        let (len_a, len_b) = (a.frame_count(), b.frame_count());
        let layout =
            TransitionLayout::for_kind(kind, len_a, len_b, window_frames(duration_secs, fps));
        tracing::debug!(
            transition = %kind,
            pre = layout.pre,
            window = layout.window,
            post = layout.post,
            "Applying transition"
        );

        let b_offset = frames_to_secs(layout.b_start, fps);
        let mut audio = a.audio().to_vec();
        audio.extend(b.audio().iter().map(|span| span.shifted(b_offset)));

        let n = layout.window;
        let joined = match kind {
            TransitionKind::None => Clip::concat(vec![a, b])?,
            _ if n == 0 => Clip::concat(vec![a, b])?,
            TransitionKind::Fade => Clip::concat(vec![a.faded(0, n), b.faded(n, 0)])?,
            TransitionKind::Slide | TransitionKind::Zoom | TransitionKind::Spin => {
                let tail: Vec<RgbImage> = a
                    .frames_between(len_a - n, len_a)?
                    .collect::<ReelResult<_>>()?;
                let head: Vec<RgbImage> = b.frames_between(0, n)?.collect::<ReelResult<_>>()?;
                let window = tail
                    .iter()
                    .zip(&head)
                    .enumerate()
                    .map(|(i, (fa, fb))| self.window_frame(kind, fa, fb, i as u64, n))
                    .collect();
                Clip::concat(vec![
                    a.trim(0, len_a - n),
                    Clip::frames(window, fps)?,
                    b.trim(n, len_b),
                ])?
            }
        };
        Ok(joined.with_audio(audio))
    }

    fn window_frame(
        &self,
        kind: TransitionKind,
        a: &RgbImage,
        b: &RgbImage,
        i: u64,
        n: u64,
    ) -> RgbImage {
        match kind {
            TransitionKind::Slide => slide_frame(a, b, i, n, self.slide_blend_width),
            TransitionKind::Zoom => zoom_pair(a, b, i, n, self.zoom_direction),
            TransitionKind::Spin => spin_pair(a, b, i, n),
            TransitionKind::None | TransitionKind::Fade => b.clone(),
        }
    }
}
