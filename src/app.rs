//! Interactive visualizer session.
//!
//! Controls:
//! - m: Toggle microphone
//! - n: Load next file from the playlist
//! - s: Stop file playback
//! - Space: Play/pause the loaded file
//! - b / c: Bars / circle mode
//! - Tab or Enter: Cycle mode
//! - f: Toggle status line
//! - q/Esc: Quit

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use crossterm::style::Color;
use tracing::{debug, info, warn};

use crate::audio::{AudioBackend, GraphManager, GraphState, PlaybackEvent};
use crate::config::{AppConfig, StartSource};
use crate::error::GraphError;
use crate::render::{halfblock, VisualMode, Visualizer};
use crate::scheduler::FrameScheduler;
use crate::terminal::Terminal;

/// Longest the loop blocks on input while idle
const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleMic,
    NextFile,
    StopFile,
    TogglePlay,
    SetMode(VisualMode),
    CycleMode,
    ToggleStatus,
}

pub fn key_action(code: KeyCode) -> Option<Action> {
    let action = match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('m') => Action::ToggleMic,
        KeyCode::Char('n') => Action::NextFile,
        KeyCode::Char('s') => Action::StopFile,
        KeyCode::Char(' ') => Action::TogglePlay,
        KeyCode::Char('b') => Action::SetMode(VisualMode::Bars),
        KeyCode::Char('c') => Action::SetMode(VisualMode::Circle),
        KeyCode::Tab | KeyCode::Enter => Action::CycleMode,
        KeyCode::Char('f') => Action::ToggleStatus,
        _ => return None,
    };
    Some(action)
}

/// `m:ss`, or `h:mm:ss` past the hour
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0) as u64 } else { 0 };
    let (h, m, s) = (total / 3600, total / 60 % 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// What the transport display last heard from the media element
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct TransportView {
    playing: bool,
    position: f64,
    duration: f64,
}

impl TransportView {
    fn apply(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Play => self.playing = true,
            PlaybackEvent::Pause => self.playing = false,
            PlaybackEvent::TimeUpdate(t) => self.position = t,
            PlaybackEvent::DurationKnown(d) => {
                self.duration = d;
                self.position = 0.0;
            }
        }
    }
}

pub struct App<B: AudioBackend> {
    manager: GraphManager<B>,
    visualizer: Visualizer,
    scheduler: FrameScheduler,
    playlist: Vec<PathBuf>,
    /// Playlist index loaded by the next `NextFile`
    next_track: usize,
    current: Option<PathBuf>,
    show_status: bool,
    transport: TransportView,
    last_error: Option<String>,
    /// Screen needs repainting outside the frame cadence
    dirty: bool,
}

impl<B: AudioBackend> App<B> {
    pub fn new(backend: B, config: &AppConfig) -> Self {
        Self {
            manager: GraphManager::new(backend),
            visualizer: Visualizer::new(config.mode, 0, 0),
            scheduler: FrameScheduler::new(config.frame_rate),
            playlist: config.playlist.clone(),
            next_track: 0,
            current: None,
            show_status: config.show_status,
            transport: TransportView::default(),
            last_error: None,
            dirty: true,
        }
    }

    #[cfg(test)]
    pub fn manager(&self) -> &GraphManager<B> {
        &self.manager
    }

    #[cfg(test)]
    pub fn visualizer(&self) -> &Visualizer {
        &self.visualizer
    }

    #[cfg(test)]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn start(&mut self, start: &StartSource) {
        match start {
            StartSource::Files => self.load_next(),
            StartSource::Microphone => self.toggle_mic(),
        }
    }

    fn report(&mut self, err: GraphError) {
        warn!("{}", err);
        self.last_error = Some(err.to_string());
    }

    fn load_next(&mut self) {
        if self.playlist.is_empty() {
            self.last_error = Some("no files given (spectra play <FILES>...)".to_string());
            return;
        }
        let path = self.playlist[self.next_track % self.playlist.len()].clone();
        self.next_track = (self.next_track + 1) % self.playlist.len();

        self.last_error = None;
        match self.manager.load_file(&path) {
            Ok(_) => self.current = Some(path),
            Err(e @ GraphError::Decode { .. }) => self.report(e),
            Err(e) => {
                // Loaded but inactive
                self.current = Some(path);
                self.report(e);
            }
        }
    }

    fn toggle_mic(&mut self) {
        if self.manager.state() == GraphState::MicActive {
            self.manager.stop_microphone();
            return;
        }
        self.last_error = None;
        match self.manager.start_microphone() {
            Ok(_) => self.current = None,
            Err(e) => self.report(e),
        }
    }

    fn toggle_play(&mut self) {
        if self.manager.state() != GraphState::FileActive {
            return;
        }
        let media = self.manager.media();
        if media.is_playing() {
            media.pause();
        } else if let Err(e) = media.play() {
            self.report(e);
        }
    }

    fn log_graph(&self) {
        debug!(
            "graph: {:?} engine={} file={:?} analyser={:?} {:?}",
            self.manager.state(),
            self.manager.engine_created(),
            self.manager.file_binding_id(),
            self.manager.analyser_id(),
            self.manager.routes()
        );
        let media = self.manager.media();
        if media.has_source() {
            debug!("media at {:.2}s of {:.2}s", media.current_time(), media.duration());
        }
    }

    /// Apply `action`; returns true when the session should end
    pub fn handle(&mut self, action: Action) -> bool {
        debug!("action: {:?}", action);
        self.dirty = true;
        match action {
            Action::Quit => return true,
            Action::ToggleMic => self.toggle_mic(),
            Action::NextFile => self.load_next(),
            Action::StopFile => {
                self.manager.stop_file();
                self.current = None;
            }
            Action::TogglePlay => self.toggle_play(),
            Action::SetMode(mode) => self.visualizer.set_visual_mode(mode),
            Action::CycleMode => {
                let next = self.visualizer.mode().next();
                self.visualizer.set_visual_mode(next);
            }
            Action::ToggleStatus => self.show_status = !self.show_status,
        }
        if matches!(action, Action::ToggleMic | Action::NextFile | Action::StopFile) {
            self.log_graph();
        }
        if !self.manager.is_active() {
            self.scheduler.cancel();
        }
        false
    }

    /// Forward the media element's events to the transport view and the graph
    fn pump_playback_events(&mut self) {
        let events = self.manager.media().take_events();
        for event in events {
            self.transport.apply(event);
            self.manager.on_playback_event(event);
        }
        if !self.manager.media().has_source() {
            self.transport = TransportView::default();
        }
    }

    pub fn status_line(&self) -> String {
        let source = match self.manager.state() {
            GraphState::Idle => "idle".to_string(),
            GraphState::MicActive => "mic".to_string(),
            GraphState::FileActive => {
                let name = self
                    .current
                    .as_ref()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let icon = if self.transport.playing { '>' } else { '|' };
                format!(
                    "{} {} {}/{}",
                    icon,
                    name,
                    format_time(self.transport.position),
                    format_time(self.transport.duration)
                )
            }
        };
        let mut line = format!(" {} | {} ", source, self.visualizer.mode());
        if let Some(err) = &self.last_error {
            line.push_str("| ");
            line.push_str(err);
            line.push(' ');
        }
        line
    }

    /// Pixel surface size for a `cols` x `rows` terminal
    pub fn surface_size(&self, cols: u16, rows: u16) -> (u32, u32) {
        let rows = if self.show_status { rows.saturating_sub(1) } else { rows };
        (cols as u32, rows as u32 * 2)
    }

    /// Advance one step of the loop: keep the scheduler in step with the
    /// source and run a due frame. Returns true when a frame was drawn.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.pump_playback_events();
        self.scheduler.sync(self.manager.is_active(), now);
        match self.scheduler.poll(now) {
            Some(token) => {
                self.scheduler
                    .run_frame(token, &mut self.manager, &mut self.visualizer, now)
            }
            None => false,
        }
    }

    /// How long the loop may block on input before the next frame
    pub fn wait_budget(&self, now: Instant) -> Duration {
        match self.scheduler.next_due() {
            Some(due) => due.saturating_duration_since(now),
            None => IDLE_POLL,
        }
    }

    fn paint(&self, term: &mut Terminal) {
        let (cols, rows) = term.size();
        term.clear();
        if self.manager.is_active() {
            halfblock::present(term, self.visualizer.surface(), 0);
        } else {
            let hint = "m: microphone   n: next file   q: quit";
            let x = cols as i32 / 2 - hint.len() as i32 / 2;
            term.set_str(x, rows as i32 / 2, hint, Some(Color::DarkGrey), false);
        }
        if self.show_status && rows > 0 {
            let color = if self.last_error.is_some() { Color::Red } else { Color::Grey };
            term.set_str(0, rows as i32 - 1, &self.status_line(), Some(color), false);
        }
    }

    pub fn run(&mut self, term: &mut Terminal) -> io::Result<()> {
        loop {
            if term.refresh_size()? {
                self.dirty = true;
            }
            let (cols, rows) = term.size();
            let (w, h) = self.surface_size(cols, rows);
            self.visualizer.resize(w, h);

            let now = Instant::now();
            let drew = self.tick(now);
            if drew || self.dirty {
                self.paint(term);
                term.render()?;
                self.dirty = false;
            }

            if let Some(key) = term.wait_key(self.wait_budget(Instant::now()))? {
                if let Some(action) = key_action(key.code) {
                    if self.handle(action) {
                        break;
                    }
                }
            }
        }

        self.scheduler.cancel();
        self.manager.stop_microphone();
        self.manager.stop_file();
        info!("session ended");
        Ok(())
    }
}
