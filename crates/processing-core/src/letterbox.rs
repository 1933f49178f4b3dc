//! Fitting frames into the vertical canvas.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use reelforge_common::config::PhotoBackground;

/// Size that fits `src` into `target` edge-to-edge, preserving aspect ratio.
///
/// A source wider than the target matches the target width, otherwise the
/// target height; the other side is truncated (never below 1).
pub fn fit_within(src: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = (src.0.max(1) as f64, src.1.max(1) as f64);
    let (target_w, target_h) = target;
    let clip_ar = src_w / src_h;
    let target_ar = target_w as f64 / target_h.max(1) as f64;

    if clip_ar > target_ar {
        let new_h = (target_w as f64 / clip_ar) as u32;
        (target_w, new_h.clamp(1, target_h.max(1)))
    } else {
        let new_w = (target_h as f64 * clip_ar) as u32;
        (new_w.clamp(1, target_w.max(1)), target_h)
    }
}

/// Like [`fit_within`] but never enlarges the source.
pub fn thumbnail_size(src: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    if src.0 <= bounds.0 && src.1 <= bounds.1 {
        return src;
    }
    let scale = (bounds.0 as f64 / src.0 as f64).min(bounds.1 as f64 / src.1 as f64);
    (
        ((src.0 as f64 * scale).round() as u32).clamp(1, bounds.0),
        ((src.1 as f64 * scale).round() as u32).clamp(1, bounds.1),
    )
}

/// Top-left position that centers `inner` within `outer`.
pub fn center_offset(inner: (u32, u32), outer: (u32, u32)) -> (i64, i64) {
    (
        (outer.0 as i64 - inner.0 as i64) / 2,
        (outer.1 as i64 - inner.1 as i64) / 2,
    )
}

/// Paste `img` centered onto a `size` canvas filled with `background`.
pub fn center_on_canvas(img: &RgbImage, size: (u32, u32), background: [u8; 3]) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(size.0, size.1, Rgb(background));
    let (x, y) = center_offset(img.dimensions(), size);
    imageops::overlay(&mut canvas, img, x, y);
    canvas
}

/// Resize a frame to fit `target` and center it over a solid background.
pub fn resize_and_center(frame: &RgbImage, target: (u32, u32), background: [u8; 3]) -> RgbImage {
    if frame.dimensions() == target {
        return frame.clone();
    }
    let (w, h) = fit_within(frame.dimensions(), target);
    let resized = if (w, h) == frame.dimensions() {
        frame.clone()
    } else {
        imageops::resize(frame, w, h, FilterType::Triangle)
    };
    center_on_canvas(&resized, target, background)
}

/// Frame a photo into the `target` canvas: the photo is downscaled to fit
/// (never upscaled) and centered over the chosen background.
pub fn frame_photo(photo: &DynamicImage, target: (u32, u32), background: PhotoBackground) -> RgbImage {
    let rgb = photo.to_rgb8();
    let canvas = match background {
        PhotoBackground::Black => RgbImage::new(target.0, target.1),
        PhotoBackground::Blurred => {
            let stretched = imageops::resize(&rgb, target.0, target.1, FilterType::Triangle);
            imageproc::filter::gaussian_blur_f32(&stretched, 25.0)
        }
    };

    let (fw, fh) = thumbnail_size(rgb.dimensions(), target);
    let foreground = if (fw, fh) == rgb.dimensions() {
        rgb
    } else {
        imageops::resize(&rgb, fw, fh, FilterType::Lanczos3)
    };

    let mut canvas = canvas;
    let (x, y) = center_offset(foreground.dimensions(), target);
    imageops::overlay(&mut canvas, &foreground, x, y);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const REEL: (u32, u32) = (1080, 1920);

    #[test]
    fn test_wide_source_matches_width() {
        let (w, h) = fit_within((1920, 1080), REEL);
        assert_eq!(w, 1080);
        assert_eq!(h, 607); // trunc(1080 / 1.777..)
        assert!(h < REEL.1);
    }

    #[test]
    fn test_tall_source_matches_height() {
        let (w, h) = fit_within((720, 1920), REEL);
        assert_eq!(h, 1920);
        assert_eq!(w, 720);
    }

    #[test]
    fn test_same_aspect_fills_target() {
        assert_eq!(fit_within((540, 960), REEL), REEL);
    }

    #[test]
    fn test_thumbnail_never_upscales() {
        assert_eq!(thumbnail_size((400, 300), REEL), (400, 300));
        assert_eq!(thumbnail_size((4000, 3000), REEL), (1080, 810));
    }

    #[test]
    fn test_resize_and_center_pads_with_background() {
        let frame = RgbImage::from_pixel(40, 20, Rgb([200, 10, 10]));
        let out = resize_and_center(&frame, (20, 40), [0, 0, 255]);
        assert_eq!(out.dimensions(), (20, 40));
        // 20x10 band centered vertically at rows 15..25.
        assert_eq!(out.get_pixel(10, 0), &Rgb([0, 0, 255]));
        assert!(out.get_pixel(10, 20)[0] > 190);
        assert_eq!(out.get_pixel(10, 39), &Rgb([0, 0, 255]));
    }

    #[test]
    fn test_frame_photo_small_photo_is_centered_unscaled() {
        let photo = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        let out = frame_photo(&photo, (30, 50), PhotoBackground::Black);
        assert_eq!(out.dimensions(), (30, 50));
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(10, 20), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(19, 29), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(20, 30), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_frame_photo_blurred_background_is_not_black() {
        let photo = DynamicImage::ImageRgb8(RgbImage::from_pixel(60, 20, Rgb([0, 200, 0])));
        let out = frame_photo(&photo, (30, 50), PhotoBackground::Blurred);
        assert_eq!(out.dimensions(), (30, 50));
        assert!(out.get_pixel(15, 1)[1] > 100);
    }

    proptest! {
        #[test]
        fn prop_fit_preserves_orientation_and_bounds(sw in 1u32..5000, sh in 1u32..5000) {
            let (w, h) = fit_within((sw, sh), REEL);
            prop_assert!(w <= REEL.0 && h <= REEL.1);
            prop_assert!(w == REEL.0 || h == REEL.1);
            let src_ar = sw as f64 / sh as f64;
            let target_ar = REEL.0 as f64 / REEL.1 as f64;
            if src_ar > target_ar {
                prop_assert_eq!(w, REEL.0);
            } else {
                prop_assert_eq!(h, REEL.1);
            }
        }
    }
}
