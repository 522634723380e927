//! Frequency analysis node.
//!
//! An analyser owns a 256-sample input window that an audio thread keeps
//! topped up. Once per frame the control thread copies that window out,
//! runs the FFT and refreshes a byte-scaled [`FrequencySnapshot`] in place.
//!
//! # Algorithm
//! Hann window, magnitude scaled by 1/N, exponential smoothing across frames,
//! then decibels mapped linearly from [-100, -30] dB onto 0..=255.

use std::ops::Index;
use std::sync::{Arc, Mutex};

use spectrum_analyzer::scaling::divide_by_N;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{samples_fft_to_spectrum, FrequencyLimit};
use tracing::debug;

use super::NodeId;

/// Analysis constants
mod constants {
    /// Samples per analysis window. Not user-configurable.
    pub const FFT_SIZE: usize = 256;
    /// Frequency bins per snapshot (half the transform size)
    pub const BIN_COUNT: usize = FFT_SIZE / 2;
    /// Weight of the previous frame in the running magnitude average
    pub const SMOOTHING: f32 = 0.8;
    /// Magnitude (dB) mapped to byte 0
    pub const MIN_DECIBELS: f32 = -100.0;
    /// Magnitude (dB) mapped to byte 255
    pub const MAX_DECIBELS: f32 = -30.0;
}

pub use constants::{BIN_COUNT, FFT_SIZE};
use constants::*;

/// One frame of per-bin magnitudes, 0..=255 each
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FrequencySnapshot {
    bins: [u8; BIN_COUNT],
}

impl Default for FrequencySnapshot {
    fn default() -> Self {
        Self::filled(0)
    }
}

impl FrequencySnapshot {
    /// Snapshot with every bin set to `value`
    pub fn filled(value: u8) -> Self {
        Self {
            bins: [value; BIN_COUNT],
        }
    }

    #[cfg(test)]
    pub fn from_fn(mut f: impl FnMut(usize) -> u8) -> Self {
        let mut bins = [0u8; BIN_COUNT];
        for (i, bin) in bins.iter_mut().enumerate() {
            *bin = f(i);
        }
        Self { bins }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bins
    }

    /// Always [`BIN_COUNT`], never zero
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn clear(&mut self) {
        self.bins.fill(0);
    }

    /// Mean magnitude normalised to 0.0..=1.0
    pub fn average(&self) -> f32 {
        let sum: u32 = self.bins.iter().map(|&b| b as u32).sum();
        sum as f32 / self.bins.len() as f32 / 255.0
    }
}

impl Index<usize> for FrequencySnapshot {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.bins[index]
    }
}

/// Ring of the most recent samples fed into an analyser
struct SampleWindow {
    samples: Vec<f32>,
    write_pos: usize,
}

impl SampleWindow {
    fn new() -> Self {
        Self {
            samples: vec![0.0; FFT_SIZE],
            write_pos: 0,
        }
    }

    fn push(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.samples[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % FFT_SIZE;
        }
    }

    /// Copy samples out, oldest first
    fn copy_into(&self, out: &mut [f32]) {
        for (i, slot) in out.iter_mut().enumerate().take(FFT_SIZE) {
            *slot = self.samples[(self.write_pos + i) % FFT_SIZE];
        }
    }
}

/// Write side of an analyser, handed to whichever audio thread feeds it
#[derive(Clone)]
pub struct AnalyserInput {
    window: Arc<Mutex<SampleWindow>>,
}

impl Default for AnalyserInput {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyserInput {
    pub fn new() -> Self {
        Self {
            window: Arc::new(Mutex::new(SampleWindow::new())),
        }
    }

    /// Append mono samples. Called from the audio thread.
    pub fn push(&self, samples: &[f32]) {
        if let Ok(mut window) = self.window.lock() {
            window.push(samples);
        }
    }

    /// Copy the latest window. Reads a zeroed window if the lock is poisoned.
    fn read(&self, out: &mut [f32]) {
        match self.window.lock() {
            Ok(window) => window.copy_into(out),
            Err(_) => out.fill(0.0),
        }
    }
}

/// Map a linear magnitude onto the 0..=255 byte range
fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 || !magnitude.is_finite() {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

/// Frequency analysis transform with a fixed 256-sample window
pub struct AnalyserNode {
    id: NodeId,
    input: AnalyserInput,
    sample_rate: u32,
    samples: Vec<f32>,
    smoothed: Vec<f32>,
}

impl AnalyserNode {
    /// Build an analyser around an input window already registered in the graph
    pub fn new(id: NodeId, input: AnalyserInput, sample_rate: u32) -> Self {
        Self {
            id,
            input,
            sample_rate: sample_rate.max(1),
            samples: vec![0.0; FFT_SIZE],
            smoothed: vec![0.0; BIN_COUNT],
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Refresh `snapshot` from the latest input window.
    pub fn fill_snapshot(&mut self, snapshot: &mut FrequencySnapshot) {
        self.input.read(&mut self.samples);

        let windowed = hann_window(&self.samples);
        let spectrum = match samples_fft_to_spectrum(
            &windowed,
            self.sample_rate,
            FrequencyLimit::All,
            Some(&divide_by_N),
        ) {
            Ok(s) => s,
            Err(e) => {
                debug!("analyser {}: fft failed: {:?}", self.id, e);
                self.smoothed.fill(0.0);
                snapshot.clear();
                return;
            }
        };

        let mut magnitudes = spectrum.data().iter().map(|(_, val)| val.val());
        for (bin, smoothed) in snapshot.bins.iter_mut().zip(self.smoothed.iter_mut()) {
            let magnitude = magnitudes.next().unwrap_or(0.0);
            *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * magnitude;
            *bin = magnitude_to_byte(*smoothed);
        }
    }
}
