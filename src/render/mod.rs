//! Spectrum renderer.
//!
//! [`render`] is a pure function of snapshot, surface and mode; the
//! [`Visualizer`] owns the surface and the selected mode between frames.

pub mod bars;
pub mod halfblock;
pub mod radial;
pub mod surface;

use std::fmt;
use std::str::FromStr;

use image::RgbaImage;
use serde::Deserialize;

use crate::audio::FrequencySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualMode {
    #[default]
    Bars,
    #[serde(alias = "radial")]
    Circle,
}

impl VisualMode {
    pub fn next(self) -> Self {
        match self {
            VisualMode::Bars => VisualMode::Circle,
            VisualMode::Circle => VisualMode::Bars,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VisualMode::Bars => "bars",
            VisualMode::Circle => "circle",
        }
    }
}

impl fmt::Display for VisualMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisualMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bars" | "bar" => Ok(VisualMode::Bars),
            "circle" | "radial" => Ok(VisualMode::Circle),
            other => Err(format!("unknown mode '{}' (expected bars or circle)", other)),
        }
    }
}

/// Draw `snapshot` into `img` in the given mode, replacing the previous frame
pub fn render(snapshot: &FrequencySnapshot, img: &mut RgbaImage, mode: VisualMode) {
    match mode {
        VisualMode::Bars => bars::draw(snapshot, img),
        VisualMode::Circle => radial::draw(snapshot, img),
    }
}

pub struct Visualizer {
    mode: VisualMode,
    surface: RgbaImage,
}

impl Visualizer {
    pub fn new(mode: VisualMode, width: u32, height: u32) -> Self {
        Self {
            mode,
            surface: RgbaImage::new(width, height),
        }
    }

    pub fn mode(&self) -> VisualMode {
        self.mode
    }

    /// Takes effect on the next drawn frame
    pub fn set_visual_mode(&mut self, mode: VisualMode) {
        self.mode = mode;
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.surface.dimensions() != (width, height) {
            self.surface = RgbaImage::new(width, height);
        }
    }

    pub fn draw(&mut self, snapshot: &FrequencySnapshot) {
        render(snapshot, &mut self.surface, self.mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!("bars".parse::<VisualMode>(), Ok(VisualMode::Bars));
        assert_eq!("Radial".parse::<VisualMode>(), Ok(VisualMode::Circle));
        assert!("waves".parse::<VisualMode>().is_err());
        assert_eq!(VisualMode::Bars.next().next(), VisualMode::Bars);
    }

    #[test]
    fn switching_mode_changes_the_next_frame() {
        let snapshot = FrequencySnapshot::from_fn(|i| (i * 2) as u8);
        let mut viz = Visualizer::new(VisualMode::Bars, 128, 96);
        viz.draw(&snapshot);
        let bars = viz.surface().clone();

        viz.set_visual_mode(VisualMode::Circle);
        viz.draw(&snapshot);
        assert_ne!(viz.surface().as_raw(), bars.as_raw());

        viz.set_visual_mode(VisualMode::Bars);
        viz.draw(&snapshot);
        assert_eq!(viz.surface().as_raw(), bars.as_raw());
    }

    #[test]
    fn resize_replaces_the_surface() {
        let mut viz = Visualizer::new(VisualMode::Bars, 10, 10);
        viz.resize(20, 8);
        assert_eq!(viz.surface().dimensions(), (20, 8));
    }
}
