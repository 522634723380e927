//! The audio engine: one output stream and the signal graph it renders.
//!
//! Created once per process on the first user action that needs audio and
//! never torn down. Everything the audio threads touch lives behind
//! [`EngineShared`]; the control thread reconfigures it between frames.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::analyser::{AnalyserInput, AnalyserNode};
use super::backend::{AudioBackend, CaptureSink, OutputHandle};
use super::graph::{NodeId, NodeKind, SignalGraph};
use super::media::MediaElement;
use crate::error::Result;

/// State shared between the control thread and the audio threads
pub struct EngineShared {
    graph: SignalGraph,
    /// The media element bound to the file source node, once bound
    bound: Option<(NodeId, MediaElement)>,
    stereo: Vec<f32>,
    mono: Vec<f32>,
}

impl EngineShared {
    fn new() -> Self {
        Self {
            graph: SignalGraph::new(),
            bound: None,
            stereo: Vec::new(),
            mono: Vec::new(),
        }
    }

    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SignalGraph {
        &mut self.graph
    }

    /// Produce one output buffer. Runs on the output thread.
    fn render(&mut self, out: &mut [f32], channels: usize, sample_rate: u32) {
        out.fill(0.0);
        let Self {
            graph,
            bound,
            stereo,
            mono,
        } = self;
        let Some((file, element)) = bound else {
            return;
        };

        let channels = channels.max(1);
        let frames = out.len() / channels;
        let produced = element.pull(stereo, frames, sample_rate);
        if produced == 0 {
            return;
        }

        mono.clear();
        mono.extend(stereo.chunks_exact(2).take(produced).map(|f| (f[0] + f[1]) * 0.5));
        for input in graph.analyser_inputs(*file) {
            input.push(mono.as_slice());
        }

        if !graph.reaches_destination(*file) {
            return;
        }
        for (frame, pair) in out.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
            match frame {
                [only] => *only = (pair[0] + pair[1]) * 0.5,
                [left, right, rest @ ..] => {
                    *left = pair[0];
                    *right = pair[1];
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
    }

    /// Route captured samples to the analysers the mic feeds. Runs on the
    /// capture thread.
    fn capture(&self, mic: NodeId, samples: &[f32]) {
        for input in self.graph.analyser_inputs(mic) {
            input.push(samples);
        }
    }
}

fn lock(shared: &Mutex<EngineShared>) -> MutexGuard<'_, EngineShared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Engine {
    shared: Arc<Mutex<EngineShared>>,
    output: OutputHandle,
    monitor_gain: NodeId,
}

impl Engine {
    /// Open the output stream and build the base graph
    pub fn create<B: AudioBackend + ?Sized>(backend: &mut B) -> Result<Self> {
        let shared = Arc::new(Mutex::new(EngineShared::new()));
        let render_shared = Arc::clone(&shared);
        let output = backend.open_output(Box::new(move |out, channels, sample_rate| {
            lock(&render_shared).render(out, channels, sample_rate);
        }))?;

        // Parks gain for a monitoring path; nothing routes through it yet
        let monitor_gain = lock(&shared)
            .graph
            .add_node(NodeKind::MonitorGain { gain: 0.0 });

        info!(
            "audio engine up: {} Hz, {} channels",
            output.sample_rate(),
            output.channels()
        );
        Ok(Self {
            shared,
            output,
            monitor_gain,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.output.sample_rate()
    }

    pub fn monitor_gain(&self) -> NodeId {
        self.monitor_gain
    }

    pub fn shared(&self) -> MutexGuard<'_, EngineShared> {
        lock(&self.shared)
    }

    /// Create the file source node and bind `element` to it
    pub fn bind_media(&self, element: &MediaElement) -> NodeId {
        let mut shared = self.shared();
        let id = shared.graph.add_node(NodeKind::FileSource);
        shared.bound = Some((id, element.clone()));
        id
    }

    /// Analysis node factory: a fresh 256-point analyser registered in the graph
    pub fn create_analyser(&self, sample_rate: u32) -> AnalyserNode {
        let input = AnalyserInput::new();
        let id = self
            .shared()
            .graph
            .add_node(NodeKind::Analyser(input.clone()));
        AnalyserNode::new(id, input, sample_rate)
    }

    /// Sink that forwards captured samples from node `mic` into the graph
    pub fn capture_sink(&self, mic: NodeId) -> CaptureSink {
        let shared = Arc::clone(&self.shared);
        Box::new(move |samples: &[f32]| {
            lock(&shared).capture(mic, samples);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::media::DecodedAudio;
    use crate::audio::mock::MockBackend;

    fn engine() -> (Engine, MockBackend) {
        let mut backend = MockBackend::new();
        let engine = Engine::create(&mut backend).unwrap();
        (engine, backend)
    }

    fn loud_element() -> MediaElement {
        let element = MediaElement::new();
        element.set_source(DecodedAudio {
            samples: vec![0.5; 2 * 4800],
            channels: 2,
            sample_rate: 48000,
        });
        element.play().unwrap();
        element
    }

    #[test]
    fn base_graph_has_destination_and_monitor_gain() {
        let (engine, _backend) = engine();
        let shared = engine.shared();
        assert!(shared.graph().has_node(NodeId::DESTINATION));
        assert!(matches!(
            shared.graph().kind(engine.monitor_gain()),
            Some(NodeKind::MonitorGain { .. })
        ));
        assert!(!shared.graph().reaches_destination(engine.monitor_gain()));
    }

    #[test]
    fn unconnected_file_source_is_silent() {
        let (engine, backend) = engine();
        let element = loud_element();
        engine.bind_media(&element);

        let out = backend.pump_output(64);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn connected_file_source_is_audible_and_analysed() {
        let (engine, backend) = engine();
        let element = loud_element();
        let file = engine.bind_media(&element);
        let mut analyser = engine.create_analyser(engine.sample_rate());
        {
            let mut shared = engine.shared();
            shared.graph_mut().connect(file, analyser.id()).unwrap();
            shared
                .graph_mut()
                .connect(analyser.id(), NodeId::DESTINATION)
                .unwrap();
        }

        let out = backend.pump_output(256);
        assert!(out.iter().all(|&s| s == 0.5));

        let mut snapshot = crate::audio::FrequencySnapshot::default();
        analyser.fill_snapshot(&mut snapshot);
        assert!(snapshot[0] > 0, "DC bin should register a constant signal");
    }

    #[test]
    fn capture_reaches_only_connected_analysers() {
        let (engine, _backend) = engine();
        let mic = engine.shared().graph_mut().add_node(NodeKind::MicSource);
        let mut fed = engine.create_analyser(48000);
        let mut idle = engine.create_analyser(48000);
        engine.shared().graph_mut().connect(mic, fed.id()).unwrap();

        let mut sink = engine.capture_sink(mic);
        sink(&[0.5; 256]);

        let mut snapshot = crate::audio::FrequencySnapshot::default();
        fed.fill_snapshot(&mut snapshot);
        assert!(snapshot[0] > 0);
        idle.fill_snapshot(&mut snapshot);
        assert_eq!(snapshot[0], 0);
    }
}
