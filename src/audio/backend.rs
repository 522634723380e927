//! Device seam between the graph and the platform audio layer.
//!
//! The graph manager never touches `cpal` directly: it asks an
//! [`AudioBackend`] for one output stream (the engine output) and for capture
//! streams. Streams come back type-erased so the manager only deals with
//! their lifetime.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;

/// Fills one interleaved output buffer: `(buffer, channels, sample_rate)`
pub type OutputRender = Box<dyn FnMut(&mut [f32], usize, u32) + Send + 'static>;

/// Receives captured mono samples
pub type CaptureSink = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Platform audio layer
pub trait AudioBackend {
    /// Open the engine output and start pulling from `render`
    fn open_output(&mut self, render: OutputRender) -> Result<OutputHandle>;

    /// Ask for microphone access and start delivering samples to `sink`.
    /// Any refusal or device failure is a `PermissionDenied`.
    fn request_capture(&mut self, sink: CaptureSink) -> Result<CaptureStream>;
}

/// The running engine output stream
pub struct OutputHandle {
    sample_rate: u32,
    channels: u16,
    _stream: Box<dyn Any>,
}

impl OutputHandle {
    pub fn new(sample_rate: u32, channels: u16, stream: Box<dyn Any>) -> Self {
        Self {
            sample_rate,
            channels,
            _stream: stream,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

/// Observable stopped-flag of a capture track; outlives the track itself
#[cfg(test)]
#[derive(Clone, Debug)]
pub struct TrackState {
    stopped: Arc<AtomicBool>,
}

#[cfg(test)]
impl TrackState {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// One capture track; dropping its stream ends delivery
pub struct CaptureTrack {
    label: String,
    stopped: Arc<AtomicBool>,
    stream: Option<Box<dyn Any>>,
}

impl CaptureTrack {
    pub fn new(label: impl Into<String>, stream: Box<dyn Any>) -> Self {
        Self {
            label: label.into(),
            stopped: Arc::new(AtomicBool::new(false)),
            stream: Some(stream),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> TrackState {
        TrackState {
            stopped: Arc::clone(&self.stopped),
        }
    }

    /// Stop delivery. Stopping a stopped track does nothing.
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            debug!("capture track '{}' stopped", self.label);
        }
        self.stopped.store(true, Ordering::Release);
    }
}

impl Drop for CaptureTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A granted microphone stream
pub struct CaptureStream {
    sample_rate: u32,
    tracks: Vec<CaptureTrack>,
}

impl CaptureStream {
    pub fn new(sample_rate: u32, tracks: Vec<CaptureTrack>) -> Self {
        Self {
            sample_rate,
            tracks,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn tracks(&self) -> &[CaptureTrack] {
        &self.tracks
    }

    pub fn stop_all(&mut self) {
        for track in &mut self.tracks {
            track.stop();
        }
    }
}
