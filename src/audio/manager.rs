//! Audio source graph manager.
//!
//! Owns the single live signal path: nothing, a file played through the
//! engine output, or a microphone that is measured but never played back.
//! Every switch tears the previous path down completely before the next is
//! built. The one exception is the file source node, which is created once
//! per engine and reconnected on every later load.
//!
//! # States
//! - `Idle`: no source, no analyser
//! - `FileActive`: file-source -> analyser -> destination
//! - `MicActive`: mic-source -> analyser (no route to the destination)

use std::path::Path;

use tracing::{debug, info, warn};

use super::analyser::{AnalyserNode, FrequencySnapshot};
use super::backend::{AudioBackend, CaptureStream};
use super::engine::Engine;
use super::graph::{NodeId, NodeKind};
use super::media::{decode_file, DecodedAudio, MediaElement, PlaybackEvent};
use crate::error::{GraphError, Result};

/// Coarse state of the signal path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Idle,
    FileActive,
    MicActive,
}

/// Returned once a source is live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready;

/// Which of the two exclusive routes currently carry audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Routes {
    /// File source reaches the engine output
    pub file_audible: bool,
    /// Microphone feeds an analyser
    pub mic_analysed: bool,
}

struct FileSession {
    analyser: AnalyserNode,
}

struct MicSession {
    source: NodeId,
    stream: CaptureStream,
    analyser: AnalyserNode,
}

enum ActiveSource {
    None,
    File(FileSession),
    Mic(MicSession),
}

pub struct GraphManager<B: AudioBackend> {
    backend: B,
    engine: Option<Engine>,
    /// File source node; created at most once per engine
    file_source: Option<NodeId>,
    media: MediaElement,
    active: ActiveSource,
    snapshot: FrequencySnapshot,
}

impl<B: AudioBackend> GraphManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            engine: None,
            file_source: None,
            media: MediaElement::new(),
            active: ActiveSource::None,
            snapshot: FrequencySnapshot::default(),
        }
    }

    pub fn state(&self) -> GraphState {
        match self.active {
            ActiveSource::None => GraphState::Idle,
            ActiveSource::File(_) => GraphState::FileActive,
            ActiveSource::Mic(_) => GraphState::MicActive,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.active, ActiveSource::None)
    }

    pub fn engine_created(&self) -> bool {
        self.engine.is_some()
    }

    /// The playback element the transport collaborator drives
    pub fn media(&self) -> &MediaElement {
        &self.media
    }

    pub fn file_binding_id(&self) -> Option<NodeId> {
        self.file_source
    }

    pub fn analyser_id(&self) -> Option<NodeId> {
        match &self.active {
            ActiveSource::None => None,
            ActiveSource::File(session) => Some(session.analyser.id()),
            ActiveSource::Mic(session) => Some(session.analyser.id()),
        }
    }

    /// Lazily create the engine. Once created it is reused for the rest of
    /// the process; a failed attempt leaves nothing behind.
    fn engine(&mut self) -> Result<&mut Engine> {
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => Engine::create(&mut self.backend)?,
        };
        Ok(self.engine.insert(engine))
    }

    /// Decode `path` and make it the live source
    pub fn load_file(&mut self, path: &Path) -> Result<Ready> {
        let audio = decode_file(path)?;
        info!("loaded {:?}: {:.1}s", path, audio.duration());
        self.load_media(audio)
    }

    /// Make already-decoded audio the live source
    pub fn load_media(&mut self, audio: DecodedAudio) -> Result<Ready> {
        self.engine()?;
        self.teardown();

        let Some(engine) = self.engine.as_ref() else {
            return Err(GraphError::Engine("engine missing after creation".to_string()));
        };
        let source = match self.file_source {
            Some(id) => id,
            None => {
                let id = engine.bind_media(&self.media);
                debug!("file source bound as {}", id);
                *self.file_source.insert(id)
            }
        };

        let analyser = engine.create_analyser(engine.sample_rate());
        {
            let mut shared = engine.shared();
            let graph = shared.graph_mut();
            graph.connect(source, analyser.id())?;
            graph.connect(analyser.id(), NodeId::DESTINATION)?;
        }
        self.media.set_source(audio);
        self.active = ActiveSource::File(FileSession { analyser });

        // Loaded either way; a refused start leaves the media paused
        self.media.play()?;
        Ok(Ready)
    }

    /// Tear down any file playback and start measuring the microphone
    pub fn start_microphone(&mut self) -> Result<Ready> {
        self.engine()?;
        self.teardown();

        let Some(engine) = self.engine.as_ref() else {
            return Err(GraphError::Engine("engine missing after creation".to_string()));
        };
        let source = engine.shared().graph_mut().add_node(NodeKind::MicSource);
        let sink = engine.capture_sink(source);
        let stream = match self.backend.request_capture(sink) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("microphone request failed: {}", e);
                engine.shared().graph_mut().remove_node(source);
                return Err(e);
            }
        };

        let analyser = engine.create_analyser(stream.sample_rate());
        let connected = engine.shared().graph_mut().connect(source, analyser.id());
        let mut session = MicSession {
            source,
            stream,
            analyser,
        };
        if let Err(e) = connected {
            release_mic(engine, &mut session);
            return Err(e);
        }

        info!(
            "microphone live: {} track(s) @ {} Hz",
            session.stream.tracks().len(),
            session.stream.sample_rate()
        );
        self.active = ActiveSource::Mic(session);
        Ok(Ready)
    }

    /// Stop capture and return to idle. Does nothing unless the mic is live.
    pub fn stop_microphone(&mut self) {
        if matches!(self.active, ActiveSource::Mic(_)) {
            self.teardown();
        } else {
            debug!("stop_microphone: microphone not active");
        }
    }

    /// Stop file playback and return to idle. Does nothing unless a file is live.
    pub fn stop_file(&mut self) {
        if matches!(self.active, ActiveSource::File(_)) {
            self.teardown();
        } else {
            debug!("stop_file: no file active");
        }
    }

    /// Release whatever is live. Never fails.
    fn teardown(&mut self) {
        let active = std::mem::replace(&mut self.active, ActiveSource::None);
        let Some(engine) = self.engine.as_ref() else {
            return;
        };

        match active {
            ActiveSource::None => {}
            ActiveSource::File(session) => {
                self.media.pause();
                self.media.seek(0.0);
                self.media.clear_source();

                let mut shared = engine.shared();
                let graph = shared.graph_mut();
                if let Some(source) = self.file_source {
                    graph.disconnect(source);
                }
                graph.remove_node(session.analyser.id());
                graph.disconnect(engine.monitor_gain());
                debug!("file path torn down");
            }
            ActiveSource::Mic(mut session) => {
                release_mic(engine, &mut session);
                debug!("microphone path torn down");
            }
        }
        self.snapshot.clear();
    }

    /// The current frequency snapshot, refreshed from the live analyser
    pub fn get_snapshot(&mut self) -> &FrequencySnapshot {
        match &mut self.active {
            ActiveSource::None => self.snapshot.clear(),
            ActiveSource::File(session) => session.analyser.fill_snapshot(&mut self.snapshot),
            ActiveSource::Mic(session) => session.analyser.fill_snapshot(&mut self.snapshot),
        }
        &self.snapshot
    }

    /// Transport notification. The first `Play` is the user gesture that may
    /// create the engine.
    pub fn on_playback_event(&mut self, event: PlaybackEvent) {
        if event == PlaybackEvent::Play && self.engine.is_none() {
            if let Err(e) = self.engine() {
                warn!("engine init on play failed: {}", e);
            }
        }
    }

    /// Live routes, read from the graph
    pub fn routes(&self) -> Routes {
        let Some(engine) = self.engine.as_ref() else {
            return Routes::default();
        };
        let shared = engine.shared();
        let graph = shared.graph();
        let file_audible = self
            .file_source
            .is_some_and(|id| graph.reaches_destination(id));
        let mic_analysed = match &self.active {
            ActiveSource::Mic(session) => graph.is_connected(session.source, session.analyser.id()),
            _ => false,
        };
        Routes {
            file_audible,
            mic_analysed,
        }
    }
}

/// Stop every track, then unhook and discard the mic source and its analyser
fn release_mic(engine: &Engine, session: &mut MicSession) {
    session.stream.stop_all();
    let mut shared = engine.shared();
    let graph = shared.graph_mut();
    graph.disconnect(session.source);
    graph.remove_node(session.source);
    graph.remove_node(session.analyser.id());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{MockBackend, MOCK_RATE};
    use proptest::prelude::*;

    fn tone(seconds: f64) -> DecodedAudio {
        let frames = (seconds * MOCK_RATE as f64) as usize;
        DecodedAudio {
            samples: (0..frames * 2).map(|i| (i as f32 * 0.05).sin() * 0.5).collect(),
            channels: 2,
            sample_rate: MOCK_RATE,
        }
    }

    fn manager() -> (GraphManager<MockBackend>, MockBackend) {
        let backend = MockBackend::new();
        (GraphManager::new(backend.clone()), backend)
    }

    fn edge_count(m: &GraphManager<MockBackend>) -> usize {
        m.engine.as_ref().map_or(0, |e| e.shared().graph().edge_count())
    }

    #[test]
    fn starts_idle_without_engine() {
        let (mut m, backend) = manager();
        assert_eq!(m.state(), GraphState::Idle);
        assert!(!m.engine_created());
        assert_eq!(backend.outputs_opened(), 0);
        assert!(m.get_snapshot().as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn load_file_goes_file_active_and_audible() {
        let (mut m, backend) = manager();
        assert_eq!(m.load_media(tone(1.0)), Ok(Ready));
        assert_eq!(m.state(), GraphState::FileActive);
        assert!(m.media().is_playing());
        assert_eq!(
            m.routes(),
            Routes {
                file_audible: true,
                mic_analysed: false
            }
        );

        let out = backend.pump_output(512);
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn repeated_load_reuses_binding_and_replaces_analyser() {
        let (mut m, backend) = manager();
        m.load_media(tone(1.0)).unwrap();
        let binding_a = m.file_binding_id();
        let analyser_a = m.analyser_id();

        m.load_media(tone(2.0)).unwrap();
        assert_eq!(m.state(), GraphState::FileActive);
        assert_eq!(m.file_binding_id(), binding_a);
        assert_ne!(m.analyser_id(), analyser_a);
        assert!((m.media().duration() - 2.0).abs() < 1e-9);
        assert_eq!(m.media().current_time(), 0.0);
        // file -> analyser -> destination, nothing stale
        assert_eq!(edge_count(&m), 2);
        assert_eq!(backend.outputs_opened(), 1);
    }

    #[test]
    fn binding_survives_stop_and_mic_sessions() {
        let (mut m, _backend) = manager();
        m.load_media(tone(1.0)).unwrap();
        let binding = m.file_binding_id();

        m.stop_file();
        m.start_microphone().unwrap();
        m.stop_microphone();
        m.load_media(tone(1.0)).unwrap();

        assert_eq!(m.file_binding_id(), binding);
    }

    #[test]
    fn stop_file_detaches_media_and_routes() {
        let (mut m, backend) = manager();
        m.load_media(tone(1.0)).unwrap();
        backend.pump_output(4800);
        m.stop_file();

        assert_eq!(m.state(), GraphState::Idle);
        assert!(!m.media().is_playing());
        assert!(!m.media().has_source());
        assert_eq!(m.media().current_time(), 0.0);
        assert_eq!(edge_count(&m), 0);
        assert!(m.file_binding_id().is_some());
        assert!(backend.pump_output(64).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn stop_is_a_noop_when_idle() {
        let (mut m, _backend) = manager();
        m.stop_file();
        m.stop_microphone();
        assert_eq!(m.state(), GraphState::Idle);
        assert!(!m.engine_created());
    }

    #[test]
    fn mic_replaces_file_and_is_never_audible() {
        let (mut m, backend) = manager();
        m.load_media(tone(1.0)).unwrap();
        let file_analyser = m.analyser_id();

        assert_eq!(m.start_microphone(), Ok(Ready));
        assert_eq!(m.state(), GraphState::MicActive);
        assert!(!m.media().is_playing());
        assert!(!m.media().has_source());
        assert_ne!(m.analyser_id(), file_analyser);
        assert_eq!(
            m.routes(),
            Routes {
                file_audible: false,
                mic_analysed: true
            }
        );

        backend.feed_capture(&[0.5; 256]);
        assert!(m.get_snapshot()[0] > 0);
        assert!(backend.pump_output(256).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn restarting_mic_requests_a_new_stream_and_stops_old_tracks() {
        let (mut m, backend) = manager();
        m.start_microphone().unwrap();
        m.stop_microphone();
        m.start_microphone().unwrap();

        assert_eq!(backend.capture_requests(), 2);
        let tracks = backend.tracks();
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].is_stopped());
        assert!(!tracks[1].is_stopped());
        // mic -> analyser only
        assert_eq!(edge_count(&m), 1);
    }

    #[test]
    fn stop_microphone_releases_everything() {
        let (mut m, backend) = manager();
        m.start_microphone().unwrap();
        m.stop_microphone();

        assert_eq!(m.state(), GraphState::Idle);
        assert!(backend.tracks().iter().all(|t| t.is_stopped()));
        assert_eq!(m.routes(), Routes::default());
        assert_eq!(edge_count(&m), 0);
    }

    #[test]
    fn denied_mic_leaves_idle_and_retry_works() {
        let (mut m, backend) = manager();
        m.load_media(tone(1.0)).unwrap();
        backend.deny_capture(true);

        assert!(matches!(
            m.start_microphone(),
            Err(GraphError::PermissionDenied(_))
        ));
        assert_eq!(m.state(), GraphState::Idle);
        assert_eq!(edge_count(&m), 0);

        backend.deny_capture(false);
        assert_eq!(m.start_microphone(), Ok(Ready));
        assert_eq!(backend.capture_requests(), 2);
    }

    #[test]
    fn empty_media_is_loaded_but_not_playing() {
        let (mut m, _backend) = manager();
        let empty = DecodedAudio {
            samples: Vec::new(),
            channels: 2,
            sample_rate: MOCK_RATE,
        };
        assert!(matches!(
            m.load_media(empty),
            Err(GraphError::PlaybackStartFailure(_))
        ));
        assert_eq!(m.state(), GraphState::FileActive);
        assert!(m.media().has_source());
        assert!(!m.media().is_playing());
    }

    #[test]
    fn undecodable_file_keeps_current_session() {
        let (mut m, _backend) = manager();
        m.load_media(tone(1.0)).unwrap();
        let analyser = m.analyser_id();

        let err = m.load_file(Path::new("/nonexistent/b.wav")).unwrap_err();
        assert!(matches!(err, GraphError::Decode { .. }));
        assert_eq!(m.state(), GraphState::FileActive);
        assert_eq!(m.analyser_id(), analyser);
    }

    #[test]
    fn engine_failure_is_retryable() {
        let (mut m, backend) = manager();
        backend.fail_output(true);
        assert!(matches!(m.start_microphone(), Err(GraphError::Engine(_))));
        assert!(!m.engine_created());

        backend.fail_output(false);
        assert_eq!(m.start_microphone(), Ok(Ready));
        assert_eq!(backend.outputs_opened(), 1);
    }

    #[test]
    fn first_play_creates_the_engine_once() {
        let (mut m, backend) = manager();
        m.on_playback_event(PlaybackEvent::TimeUpdate(1.0));
        assert!(!m.engine_created());

        m.on_playback_event(PlaybackEvent::Play);
        m.on_playback_event(PlaybackEvent::Play);
        assert!(m.engine_created());
        assert_eq!(backend.outputs_opened(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        LoadFile,
        StartMic,
        StopMic,
        StopFile,
        DenyMic(bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::LoadFile),
            Just(Op::StartMic),
            Just(Op::StopMic),
            Just(Op::StopFile),
            any::<bool>().prop_map(Op::DenyMic),
        ]
    }

    proptest! {
        #[test]
        fn file_output_and_mic_analysis_never_coexist(ops in prop::collection::vec(op(), 1..40)) {
            let (mut m, backend) = manager();
            let mut binding = None;

            for op in ops {
                match op {
                    Op::LoadFile => {
                        prop_assert!(m.load_media(tone(0.1)).is_ok());
                        if let Some(id) = binding {
                            prop_assert_eq!(m.file_binding_id(), Some(id));
                        }
                        binding = m.file_binding_id();
                    }
                    Op::StartMic => { let _ = m.start_microphone(); }
                    Op::StopMic => m.stop_microphone(),
                    Op::StopFile => m.stop_file(),
                    Op::DenyMic(deny) => backend.deny_capture(deny),
                }

                let routes = m.routes();
                prop_assert!(!(routes.file_audible && routes.mic_analysed));
                prop_assert_eq!(routes.file_audible, m.state() == GraphState::FileActive);
                prop_assert_eq!(routes.mic_analysed, m.state() == GraphState::MicActive);
                prop_assert!(backend.outputs_opened() <= 1);

                // Every granted stream except a live one has stopped tracks
                let tracks = backend.tracks();
                let live = usize::from(m.state() == GraphState::MicActive);
                let running = tracks.iter().filter(|t| !t.is_stopped()).count();
                prop_assert_eq!(running, live);
            }
        }
    }
}
