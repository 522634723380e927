//! File playback: decoding and the media element the file source binds to.
//!
//! Decoding is delegated to `hound`. The [`MediaElement`] is the playback
//! collaborator: it owns the decoded PCM and a play position, and the engine's
//! output callback pulls frames from it while it is bound into the graph.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{GraphError, Result};

/// Media time between two `TimeUpdate` events (seconds)
const TIME_UPDATE_INTERVAL: f64 = 0.25;

/// Decoded PCM, interleaved
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }

    /// Stereo pair for one frame; mono is duplicated, extra channels ignored
    fn frame(&self, index: usize) -> (f32, f32) {
        let ch = self.channels as usize;
        let base = index * ch;
        let left = self.samples[base];
        let right = if ch > 1 { self.samples[base + 1] } else { left };
        (left, right)
    }
}

/// Decode a WAV file into interleaved f32 samples
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let decode_err = |reason: String| GraphError::Decode {
        path: path.to_path_buf(),
        reason,
    };

    let reader = hound::WavReader::open(path).map_err(|e| decode_err(e.to_string()))?;
    let spec = reader.spec();
    debug!(
        "decoding {:?}: {} ch, {} Hz, {} bit {:?}",
        path, spec.channels, spec.sample_rate, spec.bits_per_sample, spec.sample_format
    );

    let samples: std::result::Result<Vec<f32>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect()
        }
    };
    let samples = samples.map_err(|e| decode_err(e.to_string()))?;

    Ok(DecodedAudio {
        samples,
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

/// Events emitted for the transport display
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    Play,
    Pause,
    TimeUpdate(f64),
    DurationKnown(f64),
}

struct MediaState {
    source: Option<Arc<DecodedAudio>>,
    /// Position in source frames (fractional while resampling)
    position: f64,
    paused: bool,
    last_time_update: f64,
    events: Vec<PlaybackEvent>,
}

impl MediaState {
    fn current_time(&self) -> f64 {
        match &self.source {
            Some(src) if src.sample_rate > 0 => self.position / src.sample_rate as f64,
            _ => 0.0,
        }
    }
}

/// Shared handle to the playback state. Clones refer to the same element.
#[derive(Clone)]
pub struct MediaElement {
    inner: Arc<Mutex<MediaState>>,
}

impl Default for MediaElement {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaElement {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MediaState {
                source: None,
                position: 0.0,
                paused: true,
                last_time_update: 0.0,
                events: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MediaState> {
        // Poisoning is ignored; the state stays consistent between calls
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach decoded audio, paused at the start
    pub fn set_source(&self, audio: DecodedAudio) {
        let mut state = self.state();
        let duration = audio.duration();
        state.source = Some(Arc::new(audio));
        state.position = 0.0;
        state.paused = true;
        state.last_time_update = 0.0;
        state.events.push(PlaybackEvent::DurationKnown(duration));
    }

    /// Detach the media; position resets and playback stays paused
    pub fn clear_source(&self) {
        let mut state = self.state();
        state.source = None;
        state.position = 0.0;
        state.paused = true;
        state.last_time_update = 0.0;
    }

    pub fn has_source(&self) -> bool {
        self.state().source.is_some()
    }

    pub fn play(&self) -> Result<()> {
        let mut state = self.state();
        let (frames, channels) = match &state.source {
            Some(src) => (src.frames(), src.channels),
            None => {
                return Err(GraphError::PlaybackStartFailure(
                    "no media loaded".to_string(),
                ))
            }
        };
        if channels == 0 || frames == 0 {
            return Err(GraphError::PlaybackStartFailure(
                "unsupported or empty media".to_string(),
            ));
        }

        if state.position >= frames as f64 {
            state.position = 0.0;
            state.last_time_update = 0.0;
        }
        if state.paused {
            state.paused = false;
            state.events.push(PlaybackEvent::Play);
        }
        Ok(())
    }

    pub fn pause(&self) {
        let mut state = self.state();
        if !state.paused {
            state.paused = true;
            state.events.push(PlaybackEvent::Pause);
        }
    }

    pub fn is_playing(&self) -> bool {
        !self.state().paused
    }

    /// Move the play position, clamped to the media length
    pub fn seek(&self, seconds: f64) {
        let mut state = self.state();
        let Some((rate, frames)) = state
            .source
            .as_ref()
            .map(|src| (src.sample_rate as f64, src.frames() as f64))
        else {
            state.position = 0.0;
            return;
        };
        state.position = (seconds.max(0.0) * rate).min(frames);
        state.last_time_update = state.current_time();
    }

    pub fn current_time(&self) -> f64 {
        self.state().current_time()
    }

    pub fn duration(&self) -> f64 {
        self.state().source.as_ref().map_or(0.0, |src| src.duration())
    }

    /// Drain queued transport events
    pub fn take_events(&self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.state().events)
    }

    /// Fill `out` with up to `frames` interleaved stereo frames at
    /// `output_rate`. Returns how many frames were produced; the rest of
    /// `out` is zeroed. Called from the audio thread.
    pub fn pull(&self, out: &mut Vec<f32>, frames: usize, output_rate: u32) -> usize {
        out.clear();
        out.resize(frames * 2, 0.0);

        let mut state = self.state();
        if state.paused {
            return 0;
        }
        let Some(src) = state.source.clone() else {
            return 0;
        };

        let total = src.frames();
        let step = src.sample_rate as f64 / output_rate.max(1) as f64;
        let mut produced = 0;
        for slot in out.chunks_exact_mut(2) {
            let index = state.position as usize;
            if index >= total {
                state.paused = true;
                state.events.push(PlaybackEvent::Pause);
                break;
            }
            let (left, right) = src.frame(index);
            slot[0] = left;
            slot[1] = right;
            state.position += step;
            produced += 1;
        }

        let now = state.current_time();
        if now - state.last_time_update >= TIME_UPDATE_INTERVAL {
            state.last_time_update = now;
            state.events.push(PlaybackEvent::TimeUpdate(now));
        }
        produced
    }
}
