//! `cpal` implementation of the device backend.

use std::fs::File;
use std::os::unix::io::AsRawFd;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, info, warn};

use super::backend::{
    AudioBackend, CaptureSink, CaptureStream, CaptureTrack, OutputHandle, OutputRender,
};
use crate::error::{GraphError, Result};

/// RAII guard to suppress stderr during ALSA device enumeration
/// Restores stderr when dropped
struct StderrSuppressor {
    saved_fd: i32,
    _dev_null: File,
}

impl StderrSuppressor {
    fn new() -> Option<Self> {
        let dev_null = File::open("/dev/null").ok()?;

        let saved_fd = unsafe { libc::dup(2) };
        if saved_fd < 0 {
            return None;
        }

        if unsafe { libc::dup2(dev_null.as_raw_fd(), 2) } < 0 {
            unsafe {
                libc::close(saved_fd);
            }
            return None;
        }

        Some(Self {
            saved_fd,
            _dev_null: dev_null,
        })
    }
}

impl Drop for StderrSuppressor {
    fn drop(&mut self) {
        unsafe {
            libc::dup2(self.saved_fd, 2);
            libc::close(self.saved_fd);
        }
    }
}

/// ALSA prints to stderr while probing, which corrupts the terminal display
fn suppress_alsa_errors() -> Option<StderrSuppressor> {
    StderrSuppressor::new()
}

fn device_name(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "Unknown".to_string())
}

/// Pick the device called `wanted`, or the host default
fn find_device(
    devices: Option<impl Iterator<Item = cpal::Device>>,
    wanted: Option<&str>,
    default: Option<cpal::Device>,
) -> Option<cpal::Device> {
    if let (Some(devices), Some(wanted)) = (devices, wanted) {
        let mut devices = devices;
        if let Some(device) = devices.find(|d| device_name(d) == wanted) {
            return Some(device);
        }
        warn!("audio device '{}' not found, using default", wanted);
    }
    default
}

/// Device names reported by the default host
#[derive(Debug, Default)]
pub struct DeviceList {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub default_input: Option<String>,
    pub default_output: Option<String>,
}

pub fn list_devices() -> DeviceList {
    let _stderr_guard = suppress_alsa_errors();
    let host = cpal::default_host();
    DeviceList {
        inputs: host
            .input_devices()
            .map(|devs| devs.map(|d| device_name(&d)).collect())
            .unwrap_or_default(),
        outputs: host
            .output_devices()
            .map(|devs| devs.map(|d| device_name(&d)).collect())
            .unwrap_or_default(),
        default_input: host.default_input_device().map(|d| device_name(&d)),
        default_output: host.default_output_device().map(|d| device_name(&d)),
    }
}

/// Backend on the platform's default `cpal` host
pub struct CpalBackend {
    host: cpal::Host,
    input_device: Option<String>,
    output_device: Option<String>,
}

impl CpalBackend {
    pub fn new(input_device: Option<String>, output_device: Option<String>) -> Self {
        let host = cpal::default_host();
        debug!("cpal host: {:?}", host.id());
        Self {
            host,
            input_device,
            output_device,
        }
    }
}

impl AudioBackend for CpalBackend {
    fn open_output(&mut self, mut render: OutputRender) -> Result<OutputHandle> {
        let stderr_guard = suppress_alsa_errors();

        let device = find_device(
            self.host.output_devices().ok(),
            self.output_device.as_deref(),
            self.host.default_output_device(),
        )
        .ok_or_else(|| GraphError::Engine("no audio output device found".to_string()))?;

        let supported = device
            .default_output_config()
            .map_err(|e| GraphError::Engine(format!("no supported output config: {}", e)))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        if channels == 0 {
            return Err(GraphError::Engine(
                "output device reported 0 channels".to_string(),
            ));
        }

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render(data, channels as usize, sample_rate);
                },
                |err| warn!("output stream error: {}", err),
                None,
            )
            .map_err(|e| GraphError::Engine(format!("failed to build output stream: {}", e)))?;
        stream
            .play()
            .map_err(|e| GraphError::Engine(format!("failed to start output: {}", e)))?;

        drop(stderr_guard);
        info!(
            "output: {} @ {}Hz, {} ch",
            device_name(&device),
            sample_rate,
            channels
        );
        Ok(OutputHandle::new(sample_rate, channels, Box::new(stream)))
    }

    fn request_capture(&mut self, mut sink: CaptureSink) -> Result<CaptureStream> {
        let stderr_guard = suppress_alsa_errors();
        let denied = |reason: String| GraphError::PermissionDenied(reason);

        let device = find_device(
            self.host.input_devices().ok(),
            self.input_device.as_deref(),
            self.host.default_input_device(),
        )
        .ok_or_else(|| denied("no audio input device found".to_string()))?;
        let name = device_name(&device);

        let supported = device
            .default_input_config()
            .map_err(|e| denied(format!("no supported input config: {}", e)))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        if channels == 0 {
            return Err(denied("input device reported 0 channels".to_string()));
        }

        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let mut mono = Vec::new();
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    mono.clear();
                    mono.extend(
                        data.chunks(channels as usize)
                            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                    );
                    sink(&mono);
                },
                |err| warn!("capture stream error: {}", err),
                None,
            )
            .map_err(|e| denied(format!("failed to open input stream: {}", e)))?;
        stream
            .play()
            .map_err(|e| denied(format!("failed to start capture: {}", e)))?;

        drop(stderr_guard);
        info!("capture: {} @ {}Hz, {} ch", name, sample_rate, channels);
        Ok(CaptureStream::new(
            sample_rate,
            vec![CaptureTrack::new(name, Box::new(stream))],
        ))
    }
}
