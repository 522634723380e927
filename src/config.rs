use std::path::PathBuf;

use crate::render::VisualMode;
use crate::settings::Settings;

/// What to start measuring when the display opens
#[derive(Debug, Clone, PartialEq)]
pub enum StartSource {
    /// Play the playlist from its first entry
    Files,
    Microphone,
}

/// Configuration for one visualizer session: settings file merged with CLI
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub start: StartSource,
    pub playlist: Vec<PathBuf>,
    pub mode: VisualMode,
    pub frame_rate: u32,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub show_status: bool,
}

impl AppConfig {
    /// CLI values, when given, override the settings file
    pub fn resolve(
        settings: &Settings,
        start: StartSource,
        playlist: Vec<PathBuf>,
        mode: Option<VisualMode>,
        fps: Option<u32>,
    ) -> Self {
        Self {
            start,
            playlist,
            mode: mode.unwrap_or(settings.mode),
            frame_rate: fps.unwrap_or(settings.frame_rate).clamp(1, 240),
            input_device: settings.input_device.clone(),
            output_device: settings.output_device.clone(),
            show_status: true,
        }
    }
}
