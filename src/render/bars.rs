//! Bar spectrum: one bottom-anchored bar per bin, hue walking the color wheel.

use image::RgbaImage;

use super::surface::{clear, fill_rect};
use crate::audio::FrequencySnapshot;
use crate::colors::{bin_hue, hsl, BLACK};

/// Height of the highlight drawn on top of every bar
const CAP_HEIGHT: f32 = 2.0;
const GAP: f32 = 1.0;

/// Slot width for `bins` bars across `width` units, before the gap
pub fn bar_width(bins: usize, width: f32) -> f32 {
    if bins == 0 {
        return 0.0;
    }
    width / bins as f32 * 2.5
}

pub fn bar_height(magnitude: u8, height: f32) -> f32 {
    magnitude as f32 / 255.0 * height * 0.8
}

pub fn draw(snapshot: &FrequencySnapshot, img: &mut RgbaImage) {
    clear(img, BLACK);
    let (width, height) = (img.width() as f32, img.height() as f32);
    let n = snapshot.len();
    let w = bar_width(n, width);

    let mut x = 0.0;
    for (i, &magnitude) in snapshot.as_slice().iter().enumerate() {
        if x >= width {
            break;
        }
        let h = bar_height(magnitude, height);
        let hue = bin_hue(i, n);
        fill_rect(img, x, height - h, w, h, hsl(hue, 1.0, 0.5));
        fill_rect(img, x, height - h - CAP_HEIGHT, w, CAP_HEIGHT, hsl(hue, 1.0, 0.3));
        x += w + GAP;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_at(img: &RgbaImage, x: u32, y: u32) -> [u8; 3] {
        let p = img.get_pixel(x, y).0;
        [p[0], p[1], p[2]]
    }

    #[test]
    fn width_for_128_bins_on_512() {
        assert_eq!(bar_width(128, 512.0), 10.0);
        assert_eq!(bar_width(0, 512.0), 0.0);
    }

    #[test]
    fn heights_span_zero_to_eighty_percent() {
        assert_eq!(bar_height(0, 100.0), 0.0);
        assert!((bar_height(255, 100.0) - 80.0).abs() < 1e-4);
    }

    #[test]
    fn full_snapshot_draws_full_bars_with_caps() {
        let mut img = RgbaImage::new(512, 100);
        draw(&FrequencySnapshot::filled(255), &mut img);

        // bar 0 covers x 0..10, rows 20..100
        assert_eq!(rgb_at(&img, 5, 99), [255, 0, 0]);
        assert_eq!(rgb_at(&img, 5, 20), [255, 0, 0]);
        assert_eq!(rgb_at(&img, 5, 19), hsl(0.0, 1.0, 0.3));
        assert_eq!(rgb_at(&img, 5, 10), BLACK);
        // the gap after bar 0
        assert_eq!(rgb_at(&img, 10, 50), BLACK);
    }

    #[test]
    fn silence_leaves_only_caps_on_the_floor() {
        let mut img = RgbaImage::new(512, 100);
        draw(&FrequencySnapshot::default(), &mut img);

        assert_eq!(rgb_at(&img, 5, 50), BLACK);
        assert_eq!(rgb_at(&img, 5, 97), BLACK);
        assert_eq!(rgb_at(&img, 5, 99), hsl(0.0, 1.0, 0.3));
    }

    #[test]
    fn previous_frame_is_cleared() {
        let mut img = RgbaImage::new(64, 32);
        draw(&FrequencySnapshot::filled(255), &mut img);
        draw(&FrequencySnapshot::default(), &mut img);
        assert_eq!(rgb_at(&img, 1, 10), BLACK);
    }
}
