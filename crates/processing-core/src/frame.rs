//! Per-frame compositing primitives used by the transitions.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

/// Linear blend: `a * (1 - weight_b) + b * weight_b`, truncated.
///
/// Both frames must have the same size.
pub fn blend(a: &RgbImage, b: &RgbImage, weight_b: f32) -> RgbImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let wb = weight_b.clamp(0.0, 1.0);
    let wa = 1.0 - wb;
    let raw: Vec<u8> = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&pa, &pb)| (pa as f32 * wa + pb as f32 * wb).clamp(0.0, 255.0) as u8)
        .collect();
    RgbImage::from_raw(a.width(), a.height(), raw).unwrap_or_else(|| a.clone())
}

/// Multiply every channel by `factor` (fade to/from black).
pub fn scale_brightness(frame: &RgbImage, factor: f32) -> RgbImage {
    let factor = factor.clamp(0.0, 1.0);
    if factor >= 1.0 {
        return frame.clone();
    }
    let mut out = frame.clone();
    for px in out.pixels_mut() {
        for c in px.0.iter_mut() {
            *c = (*c as f32 * factor) as u8;
        }
    }
    out
}

/// Brightness of frame `index` of a `len`-frame clip fading out over its
/// last `window` frames. The last frame is `1 / window`.
pub fn fade_out_factor(index: u64, len: u64, window: u64) -> f32 {
    if window == 0 {
        return 1.0;
    }
    let remaining = len.saturating_sub(index);
    (remaining as f32 / window as f32).min(1.0)
}

/// Brightness of frame `index` of a clip fading in over its first `window`
/// frames. The first frame is black.
pub fn fade_in_factor(index: u64, window: u64) -> f32 {
    if window == 0 {
        return 1.0;
    }
    (index as f32 / window as f32).min(1.0)
}

/// Scale a frame about its center, then crop (scale > 1) or pad with
/// black (scale < 1) back to the original size.
pub fn zoom_frame(frame: &RgbImage, scale: f64) -> RgbImage {
    let (w, h) = frame.dimensions();
    let new_w = ((w as f64 * scale) as u32).max(1);
    let new_h = ((h as f64 * scale) as u32).max(1);
    if (new_w, new_h) == (w, h) {
        return frame.clone();
    }
    let resized = imageops::resize(frame, new_w, new_h, FilterType::Triangle);

    if new_w >= w && new_h >= h {
        let x = (new_w - w) / 2;
        let y = (new_h - h) / 2;
        imageops::crop_imm(&resized, x, y, w, h).to_image()
    } else {
        let mut canvas = RgbImage::new(w, h);
        let x = (w as i64 - new_w as i64) / 2;
        let y = (h as i64 - new_h as i64) / 2;
        imageops::overlay(&mut canvas, &resized, x, y);
        canvas
    }
}

/// Rotate a frame counter-clockwise by `degrees` about its center, keeping
/// its size and filling uncovered corners with black.
pub fn rotate_frame(frame: &RgbImage, degrees: f64) -> RgbImage {
    if degrees.rem_euclid(360.0) == 0.0 {
        return frame.clone();
    }
    // imageproc rotates clockwise for positive angles.
    let theta = (-degrees).to_radians() as f32;
    rotate_about_center(frame, theta, Interpolation::Bilinear, Rgb([0, 0, 0]))
}
