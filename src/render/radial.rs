//! Radial spectrum: spikes around a reference circle with a pulsing core.

use std::f32::consts::TAU;

use image::RgbaImage;

use super::surface::{clear, fill_disc, stroke_circle, stroke_line};
use crate::audio::FrequencySnapshot;
use crate::colors::{bin_hue, hsl, BLACK, CYAN, WHITE};

const CORE_BASE: f32 = 15.0;
const CORE_PULSE: f32 = 10.0;
const GLOW_MARGIN: f32 = 10.0;
const GLOW_ALPHA: f32 = 0.3;
const REFERENCE_ALPHA: f32 = 0.1;

/// Base radius and maximum spike length for a `width` x `height` surface
pub fn radii(width: f32, height: f32) -> (f32, f32) {
    let half_min = width.min(height) / 2.0;
    (0.4 * half_min, 0.6 * half_min)
}

/// Radius of the inner cyan disc for a mean level `avg` in 0.0-1.0
pub fn core_radius(avg: f32) -> f32 {
    CORE_BASE + avg * CORE_PULSE
}

pub fn glow_radius(avg: f32) -> f32 {
    core_radius(avg) + GLOW_MARGIN
}

/// Start and end of the spike for bin `i` of `n`
pub fn spike_endpoints(
    center: (f32, f32),
    radius: f32,
    max_spike: f32,
    i: usize,
    n: usize,
    magnitude: u8,
) -> ((f32, f32), (f32, f32)) {
    let angle = if n == 0 { 0.0 } else { i as f32 / n as f32 * TAU };
    let (sin, cos) = angle.sin_cos();
    let reach = radius + magnitude as f32 / 255.0 * max_spike;
    (
        (center.0 + cos * radius, center.1 + sin * radius),
        (center.0 + cos * reach, center.1 + sin * reach),
    )
}

pub fn draw(snapshot: &FrequencySnapshot, img: &mut RgbaImage) {
    clear(img, BLACK);
    let (width, height) = (img.width() as f32, img.height() as f32);
    let center = (width / 2.0, height / 2.0);
    let (radius, max_spike) = radii(width, height);
    let n = snapshot.len();

    stroke_circle(img, center, radius, 1.0, WHITE, REFERENCE_ALPHA);

    for (i, &magnitude) in snapshot.as_slice().iter().enumerate() {
        let m = magnitude as f32 / 255.0;
        let (from, to) = spike_endpoints(center, radius, max_spike, i, n, magnitude);
        let color = hsl(bin_hue(i, n), 1.0, (50.0 + m * 20.0) / 100.0);
        stroke_line(img, from, to, 2.0 + m * 3.0, color);
    }

    let avg = snapshot.average();
    fill_disc(img, center, glow_radius(avg), CYAN, GLOW_ALPHA);
    fill_disc(img, center, core_radius(avg), CYAN, 1.0);
    fill_disc(img, center, core_radius(avg) / 2.0, WHITE, 1.0);
}
