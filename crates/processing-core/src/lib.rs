//! ReelForge Processing Core
//!
//! Pixel-level work on decoded frames:
//! - **Letterboxing:** fit frames and photos into the vertical canvas
//! - **Frame ops:** blending, fades, zoom crop/pad, rotation
//! - **Transitions:** window-frame compositors for slide, zoom and spin
//!
//! This crate is pure computation: no I/O, no subprocesses.
//! All inputs are frames; all outputs are frames.

pub mod frame;
pub mod letterbox;
pub mod transitions;

pub use letterbox::{fit_within, frame_photo, resize_and_center};
pub use transitions::window_frames;
