//! Drawing primitives on an RGBA framebuffer.
//!
//! Coordinates are floating point in pixel units, with pixel `(x, y)`
//! covering `[x, x+1) x [y, y+1)`. Anything outside the image is clipped.

use image::{Rgba, RgbaImage};

/// Fill the whole surface with an opaque color
pub fn clear(img: &mut RgbaImage, rgb: [u8; 3]) {
    let [r, g, b] = rgb;
    for px in img.pixels_mut() {
        *px = Rgba([r, g, b, 255]);
    }
}

/// Blend `rgb` over the pixel at `(x, y)` with coverage `alpha` (0.0-1.0)
pub fn blend(img: &mut RgbaImage, x: i64, y: i64, rgb: [u8; 3], alpha: f32) {
    if x < 0 || y < 0 || x >= img.width() as i64 || y >= img.height() as i64 {
        return;
    }
    let alpha = alpha.clamp(0.0, 1.0);
    let px = img.get_pixel_mut(x as u32, y as u32);
    for (dst, src) in px.0.iter_mut().zip(rgb) {
        *dst = (*dst as f32 * (1.0 - alpha) + src as f32 * alpha).round() as u8;
    }
    px.0[3] = 255;
}

/// Pixel index range covered by `[start, end)`, clipped to `0..limit`
fn span(start: f32, end: f32, limit: u32) -> std::ops::Range<i64> {
    let lo = start.round().max(0.0) as i64;
    let hi = (end.round() as i64).min(limit as i64);
    lo..hi.max(lo)
}

pub fn fill_rect(img: &mut RgbaImage, x: f32, y: f32, w: f32, h: f32, rgb: [u8; 3]) {
    if w <= 0.0 || h <= 0.0 {
        return;
    }
    let cols = span(x, x + w, img.width());
    for py in span(y, y + h, img.height()) {
        for px in cols.clone() {
            blend(img, px, py, rgb, 1.0);
        }
    }
}

/// Stroke a segment `width` pixels thick with butt ends. A zero-length
/// segment covers nothing.
pub fn stroke_line(
    img: &mut RgbaImage,
    from: (f32, f32),
    to: (f32, f32),
    width: f32,
    rgb: [u8; 3],
) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len2 = dx * dx + dy * dy;
    if len2 <= 0.0 || width <= 0.0 {
        return;
    }
    let len = len2.sqrt();
    let half = width / 2.0;
    let xs = span(from.0.min(to.0) - half, from.0.max(to.0) + half, img.width());
    let ys = span(from.1.min(to.1) - half, from.1.max(to.1) + half, img.height());
    for py in ys {
        for px in xs.clone() {
            let (cx, cy) = (px as f32 + 0.5 - from.0, py as f32 + 0.5 - from.1);
            let t = (cx * dx + cy * dy) / len2;
            if !(0.0..=1.0).contains(&t) {
                continue;
            }
            if (cx * dy - cy * dx).abs() / len <= half {
                blend(img, px, py, rgb, 1.0);
            }
        }
    }
}

/// Visit every pixel whose center lies within `outer` of `center`, passing
/// its distance from the center
fn for_each_in_radius(
    img: &mut RgbaImage,
    center: (f32, f32),
    outer: f32,
    mut f: impl FnMut(&mut RgbaImage, i64, i64, f32),
) {
    let xs = span(center.0 - outer, center.0 + outer, img.width());
    let ys = span(center.1 - outer, center.1 + outer, img.height());
    for py in ys {
        for px in xs.clone() {
            let d = ((px as f32 + 0.5 - center.0).powi(2) + (py as f32 + 0.5 - center.1).powi(2))
                .sqrt();
            if d <= outer {
                f(img, px, py, d);
            }
        }
    }
}

pub fn fill_disc(img: &mut RgbaImage, center: (f32, f32), radius: f32, rgb: [u8; 3], alpha: f32) {
    if radius <= 0.0 {
        return;
    }
    for_each_in_radius(img, center, radius, |img, x, y, _| blend(img, x, y, rgb, alpha));
}

pub fn stroke_circle(
    img: &mut RgbaImage,
    center: (f32, f32),
    radius: f32,
    thickness: f32,
    rgb: [u8; 3],
    alpha: f32,
) {
    let half = (thickness / 2.0).max(0.5);
    for_each_in_radius(img, center, radius + half, |img, x, y, d| {
        if (d - radius).abs() <= half {
            blend(img, x, y, rgb, alpha);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 3] = [255, 0, 0];

    fn rgb_at(img: &RgbaImage, x: u32, y: u32) -> [u8; 3] {
        let p = img.get_pixel(x, y).0;
        [p[0], p[1], p[2]]
    }

    #[test]
    fn clear_makes_everything_opaque_black() {
        let mut img = RgbaImage::new(4, 4);
        clear(&mut img, [0, 0, 0]);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn fill_rect_clips_to_the_surface() {
        let mut img = RgbaImage::new(10, 10);
        clear(&mut img, [0, 0, 0]);
        fill_rect(&mut img, 8.0, -3.0, 20.0, 5.0, RED);
        assert_eq!(rgb_at(&img, 9, 0), RED);
        assert_eq!(rgb_at(&img, 9, 1), RED);
        assert_eq!(rgb_at(&img, 9, 2), [0, 0, 0]);
        assert_eq!(rgb_at(&img, 7, 0), [0, 0, 0]);
    }

    #[test]
    fn zero_sized_rect_draws_nothing() {
        let mut img = RgbaImage::new(4, 4);
        clear(&mut img, [0, 0, 0]);
        fill_rect(&mut img, 1.0, 1.0, 2.0, 0.0, RED);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn blend_mixes_with_background() {
        let mut img = RgbaImage::new(1, 1);
        clear(&mut img, [0, 0, 0]);
        blend(&mut img, 0, 0, [200, 100, 0], 0.5);
        assert_eq!(rgb_at(&img, 0, 0), [100, 50, 0]);
        blend(&mut img, 5, 5, RED, 1.0);
    }

    #[test]
    fn line_covers_its_path_only() {
        let mut img = RgbaImage::new(20, 20);
        clear(&mut img, [0, 0, 0]);
        stroke_line(&mut img, (2.0, 10.0), (18.0, 10.0), 2.0, RED);
        assert_eq!(rgb_at(&img, 10, 10), RED);
        assert_eq!(rgb_at(&img, 10, 9), RED);
        assert_eq!(rgb_at(&img, 10, 14), [0, 0, 0]);
    }

    #[test]
    fn line_ends_square_at_its_endpoints() {
        let mut img = RgbaImage::new(20, 20);
        clear(&mut img, [0, 0, 0]);
        stroke_line(&mut img, (2.0, 10.0), (18.0, 10.0), 4.0, RED);
        assert_eq!(rgb_at(&img, 17, 10), RED);
        assert_eq!(rgb_at(&img, 18, 10), [0, 0, 0]);
        assert_eq!(rgb_at(&img, 2, 10), RED);
        assert_eq!(rgb_at(&img, 1, 10), [0, 0, 0]);
    }

    #[test]
    fn zero_length_line_draws_nothing() {
        let mut img = RgbaImage::new(8, 8);
        clear(&mut img, [0, 0, 0]);
        stroke_line(&mut img, (4.0, 4.0), (4.0, 4.0), 3.0, RED);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn disc_and_ring() {
        let mut img = RgbaImage::new(40, 40);
        clear(&mut img, [0, 0, 0]);
        fill_disc(&mut img, (20.0, 20.0), 5.0, RED, 1.0);
        assert_eq!(rgb_at(&img, 20, 20), RED);
        assert_eq!(rgb_at(&img, 20, 27), [0, 0, 0]);

        stroke_circle(&mut img, (20.0, 20.0), 15.0, 1.0, [0, 0, 255], 1.0);
        assert_eq!(rgb_at(&img, 34, 20), [0, 0, 255]);
        assert_eq!(rgb_at(&img, 30, 20), [0, 0, 0]);
    }
}
