//! Frame scheduler.
//!
//! Drives the render loop at a fixed cadence while a source is live. Each
//! scheduled frame carries a [`FrameToken`] stamped with the scheduler's
//! generation; cancelling bumps the generation, so a frame scheduled before
//! the cancel can never be run.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::audio::{AudioBackend, GraphManager};
use crate::render::Visualizer;

/// Handle for one scheduled frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken {
    generation: u64,
}

pub struct FrameScheduler {
    interval: Duration,
    generation: u64,
    pending: Option<(FrameToken, Instant)>,
}

impl FrameScheduler {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / frame_rate.max(1),
            generation: 0,
            pending: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending frame is due, if one is scheduled
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.map(|(_, due)| due)
    }

    /// Schedule a frame for `now` unless one is already pending
    pub fn start(&mut self, now: Instant) {
        if self.pending.is_none() {
            let token = FrameToken {
                generation: self.generation,
            };
            self.pending = Some((token, now));
        }
    }

    /// Drop the pending frame and invalidate every token handed out so far
    pub fn cancel(&mut self) {
        self.generation += 1;
        if self.pending.take().is_some() {
            trace!("pending frame cancelled");
        }
    }

    /// Follow the source state: run while `active`, stop dead when idle.
    /// Going idle also voids a frame already handed out by `poll`.
    pub fn sync(&mut self, active: bool, now: Instant) {
        if active {
            self.start(now);
        } else {
            self.cancel();
        }
    }

    /// Hand out the pending frame once it is due
    pub fn poll(&mut self, now: Instant) -> Option<FrameToken> {
        match self.pending {
            Some((token, due)) if now >= due => {
                self.pending = None;
                Some(token)
            }
            _ => None,
        }
    }

    /// Pull one snapshot, draw it and schedule the following frame. Returns
    /// false without drawing when the token is stale or the source has gone.
    pub fn run_frame<B: AudioBackend>(
        &mut self,
        token: FrameToken,
        manager: &mut GraphManager<B>,
        visualizer: &mut Visualizer,
        now: Instant,
    ) -> bool {
        if token.generation != self.generation {
            trace!("stale frame dropped");
            return false;
        }
        if !manager.is_active() {
            self.cancel();
            return false;
        }

        visualizer.draw(manager.get_snapshot());
        self.pending = Some((token, now + self.interval));
        true
    }
}
