//! Window-frame compositors for the frame-accurate transitions.
//!
//! Each function renders output frame `i` of an `n`-frame transition window
//! from the corresponding frames of the outgoing clip `a` and incoming clip
//! `b`. `progress = i / n` runs from 0 (all `a`) towards 1.

use image::RgbImage;
use reelforge_common::config::ZoomDirection;

use crate::frame::{blend, rotate_frame, zoom_frame};

/// Number of frames in a transition window of `duration_secs`.
pub fn window_frames(duration_secs: f64, fps: u32) -> u64 {
    reelforge_common::timing::frames_for_secs(duration_secs, fps)
}

/// Progress of window frame `i` out of `n`.
pub fn progress(i: u64, n: u64) -> f64 {
    if n == 0 {
        1.0
    } else {
        i as f64 / n as f64
    }
}

/// Slide: `a` exits to the left while `b` enters from the right.
///
/// With `x = trunc(w * (1 - p))`, columns `[0, x - bw)` show `a`'s columns
/// `[w - x + bw, w)` and columns `[x + bw, w)` show `b`'s columns
/// `[0, w - x - bw)`. The `2 * bw` seam columns in between fade linearly
/// from `a`'s last column to `b`'s first column.
///
/// The seam is one flat gradient between two edge columns, not a
/// per-column crossfade of overlapping content; `blend_width == 0` gives a
/// hard edge.
pub fn slide_frame(a: &RgbImage, b: &RgbImage, i: u64, n: u64, blend_width: u32) -> RgbImage {
    let (w, h) = a.dimensions();
    let p = progress(i, n);
    let x = (w as f64 * (1.0 - p)) as i64;
    let w = w as i64;
    let bw = blend_width as i64;
    let mut out = RgbImage::new(w as u32, h);

    let seam_start = x - bw;
    let seam_end = x + bw;
    for col in 0..w {
        if col < seam_start {
            let src = col + w - x + bw;
            copy_column(a, src, &mut out, col);
        } else if col >= seam_end {
            let src = col - x - bw;
            copy_column(b, src, &mut out, col);
        } else {
            let alpha = (col - seam_start) as f32 / (2 * bw).max(1) as f32;
            for row in 0..h {
                let pa = a.get_pixel((w - 1) as u32, row);
                let pb = b.get_pixel(0, row);
                let mut px = *pa;
                for c in 0..3 {
                    px[c] = (pa[c] as f32 * (1.0 - alpha) + pb[c] as f32 * alpha) as u8;
                }
                out.put_pixel(col as u32, row, px);
            }
        }
    }
    out
}

fn copy_column(src: &RgbImage, src_col: i64, dst: &mut RgbImage, dst_col: i64) {
    if src_col < 0 || src_col >= src.width() as i64 {
        return;
    }
    for row in 0..src.height() {
        dst.put_pixel(dst_col as u32, row, *src.get_pixel(src_col as u32, row));
    }
}

/// Scale factors for `(a, b)` at progress `p`.
pub fn zoom_scales(direction: ZoomDirection, p: f64) -> (f64, f64) {
    match direction {
        ZoomDirection::InOut => (1.2 - 0.2 * p, 0.8 + 0.2 * p),
        ZoomDirection::OutIn => (0.8 + 0.2 * p, 1.2 - 0.2 * p),
        ZoomDirection::In => (1.0 + 0.2 * p, 1.0 + 0.2 * p),
        ZoomDirection::Out => (1.2 - 0.2 * p, 1.2 - 0.2 * p),
    }
}

/// Zoom: scale both frames, then cross-blend with weights `1 - p` and `p`.
pub fn zoom_pair(a: &RgbImage, b: &RgbImage, i: u64, n: u64, direction: ZoomDirection) -> RgbImage {
    let p = progress(i, n);
    let (scale_a, scale_b) = zoom_scales(direction, p);
    blend(&zoom_frame(a, scale_a), &zoom_frame(b, scale_b), p as f32)
}

/// Rotation angles in degrees for `(a, b)` at progress `p`.
pub fn spin_angles(p: f64) -> (f64, f64) {
    (360.0 * p, -360.0 + 360.0 * p)
}

/// Spin: rotate `a` forwards and `b` from a full turn back, then
/// cross-blend with weights `1 - p` and `p`.
pub fn spin_pair(a: &RgbImage, b: &RgbImage, i: u64, n: u64) -> RgbImage {
    let p = progress(i, n);
    let (angle_a, angle_b) = spin_angles(p);
    blend(&rotate_frame(a, angle_a), &rotate_frame(b, angle_b), p as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, v: u8) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([v, v, v]))
    }

    /// Frame whose pixel value encodes its column.
    fn columns(w: u32, h: u32, base: u8) -> RgbImage {
        RgbImage::from_fn(w, h, |x, _| Rgb([base + x as u8, 0, 0]))
    }

    #[test]
    fn test_window_frames_rounds() {
        assert_eq!(window_frames(1.0, 30), 30);
        assert_eq!(window_frames(0.1, 30), 3);
        assert_eq!(window_frames(0.0, 30), 0);
    }

    #[test]
    fn test_slide_first_frame_is_all_a() {
        let a = columns(10, 2, 0);
        let b = columns(10, 2, 100);
        let out = slide_frame(&a, &b, 0, 5, 0);
        assert_eq!(out, a);
    }

    #[test]
    fn test_slide_midpoint_splits_columns() {
        let a = columns(10, 1, 0);
        let b = columns(10, 1, 100);
        // p = 0.5 -> x = 5: a's columns 5..10 then b's columns 0..5.
        let out = slide_frame(&a, &b, 1, 2, 0);
        let row: Vec<u8> = (0..10).map(|x| out.get_pixel(x, 0)[0]).collect();
        assert_eq!(row, [5, 6, 7, 8, 9, 100, 101, 102, 103, 104]);
    }

    #[test]
    fn test_slide_seam_blends_edge_columns() {
        let a = solid(10, 1, 200);
        let b = solid(10, 1, 0);
        let out = slide_frame(&a, &b, 1, 2, 2);
        // Seam covers columns 3..7.
        assert_eq!(out.get_pixel(2, 0)[0], 200);
        assert_eq!(out.get_pixel(3, 0)[0], 200);
        assert_eq!(out.get_pixel(5, 0)[0], 100);
        assert_eq!(out.get_pixel(7, 0)[0], 0);
    }

    #[test]
    fn test_zoom_scales_by_direction() {
        assert_eq!(zoom_scales(ZoomDirection::InOut, 0.0), (1.2, 0.8));
        assert_eq!(zoom_scales(ZoomDirection::OutIn, 0.0), (0.8, 1.2));
        assert_eq!(zoom_scales(ZoomDirection::In, 0.0), (1.0, 1.0));
        let (a, b) = zoom_scales(ZoomDirection::Out, 1.0);
        assert!((a - 1.0).abs() < 1e-12 && (b - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zoom_pair_starts_on_a() {
        let a = solid(20, 40, 200);
        let b = solid(20, 40, 0);
        let out = zoom_pair(&a, &b, 0, 10, ZoomDirection::InOut);
        assert_eq!(out.dimensions(), (20, 40));
        assert!(out.get_pixel(10, 20)[0] > 190);
    }

    #[test]
    fn test_spin_angles_and_first_frame() {
        assert_eq!(spin_angles(0.0), (0.0, -360.0));
        assert_eq!(spin_angles(0.5), (180.0, -180.0));
        let a = solid(16, 16, 120);
        let b = solid(16, 16, 30);
        assert_eq!(spin_pair(&a, &b, 0, 8), a);
    }
}
