//! File logging for debug runs.
//!
//! The terminal is the display, so logs never go to stdout or stderr. With
//! `--debug` a file layer is installed; otherwise no subscriber exists and
//! every `tracing` macro is a no-op.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::settings::LogSettings;

/// Debug log file permissions (owner read/write only)
const LOG_FILE_MODE: u32 = 0o600;

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(LOG_FILE_MODE)
        .open(path)
}

/// `RUST_LOG` takes precedence over the configured level
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("debug"))
}

/// Install the file subscriber when `debug` is set
pub fn init(config: &LogSettings, debug: bool) -> io::Result<()> {
    if !debug {
        return Ok(());
    }

    let file = open_log_file(&config.file)?;
    let layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .with_filter(build_filter(&config.level));

    tracing_subscriber::registry().with(layer).try_init().map_err(io::Error::other)?;

    tracing::info!("=== spectra {} ===", env!("CARGO_PKG_VERSION"));
    tracing::info!("log level: {}", config.level);
    Ok(())
}
