use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::render::VisualMode;

pub const DEFAULT_FRAME_RATE: u32 = 60;
pub const DEFAULT_LOG_FILE: &str = "/tmp/spectra.log";

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub mode: VisualMode,
    pub frame_rate: u32,
    pub input_device: Option<String>,   // cpal device name, default input if unset
    pub output_device: Option<String>,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,                  // EnvFilter directive, RUST_LOG wins
    pub file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: VisualMode::default(),
            frame_rate: DEFAULT_FRAME_RATE,
            input_device: None,
            output_device: None,
            log: LogSettings::default(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Read settings from `path`; a missing or malformed file gives defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("spectra")
            .join("config.toml")
    }
}
