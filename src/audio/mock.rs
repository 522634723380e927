//! In-process backend for tests: no devices, buffers pumped by hand.

use std::cell::RefCell;
use std::rc::Rc;

use super::backend::{
    AudioBackend, CaptureSink, CaptureStream, CaptureTrack, OutputHandle, OutputRender, TrackState,
};
use crate::error::{GraphError, Result};

pub const MOCK_RATE: u32 = 48000;
const MOCK_CHANNELS: u16 = 2;

#[derive(Default)]
struct MockState {
    render: Option<OutputRender>,
    sink: Option<CaptureSink>,
    outputs_opened: usize,
    capture_requests: usize,
    deny_capture: bool,
    fail_output: bool,
    tracks: Vec<TrackState>,
}

/// Clones share state, so a test keeps one handle after moving another
/// into the graph manager.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Rc<RefCell<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse (or allow) microphone requests from now on
    pub fn deny_capture(&self, deny: bool) {
        self.state.borrow_mut().deny_capture = deny;
    }

    pub fn fail_output(&self, fail: bool) {
        self.state.borrow_mut().fail_output = fail;
    }

    pub fn outputs_opened(&self) -> usize {
        self.state.borrow().outputs_opened
    }

    pub fn capture_requests(&self) -> usize {
        self.state.borrow().capture_requests
    }

    /// Track states of every capture ever granted, oldest first
    pub fn tracks(&self) -> Vec<TrackState> {
        self.state.borrow().tracks.clone()
    }

    /// Run the output callback for `frames` stereo frames
    pub fn pump_output(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * MOCK_CHANNELS as usize];
        if let Some(render) = self.state.borrow_mut().render.as_mut() {
            render(&mut out, MOCK_CHANNELS as usize, MOCK_RATE);
        }
        out
    }

    /// Deliver samples through the most recent capture sink
    pub fn feed_capture(&self, samples: &[f32]) {
        if let Some(sink) = self.state.borrow_mut().sink.as_mut() {
            sink(samples);
        }
    }
}

impl AudioBackend for MockBackend {
    fn open_output(&mut self, render: OutputRender) -> Result<OutputHandle> {
        let mut state = self.state.borrow_mut();
        if state.fail_output {
            return Err(GraphError::Engine("no output device".to_string()));
        }
        state.outputs_opened += 1;
        state.render = Some(render);
        Ok(OutputHandle::new(MOCK_RATE, MOCK_CHANNELS, Box::new(())))
    }

    fn request_capture(&mut self, sink: CaptureSink) -> Result<CaptureStream> {
        let mut state = self.state.borrow_mut();
        state.capture_requests += 1;
        if state.deny_capture {
            return Err(GraphError::PermissionDenied("denied by test".to_string()));
        }
        state.sink = Some(sink);
        let track = CaptureTrack::new(format!("mock-{}", state.capture_requests), Box::new(()));
        state.tracks.push(track.state());
        Ok(CaptureStream::new(MOCK_RATE, vec![track]))
    }
}
