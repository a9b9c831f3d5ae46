//! Playback state machine.
//!
//! Position is never accumulated per tick: while playing it is always
//! `cursor + (now - started_at)`, so seeking and irregular ticks cannot drift.

use std::sync::Arc;

use tokio::time::Instant;

use super::backend::{EndedSignal, NodeId, RenderBackend, SourceNode};
use super::clock::Clock;
use super::scheduler::{FrameScheduler, FrameTicker};
use crate::audio::{LoopRegion, PlaybackState, SharedPlayBuffer};
use crate::events::{EventSink, PlayerEvent};
use crate::signal::SignalTx;

pub struct PlaybackController<B: RenderBackend> {
    backend: B,
    clock: Arc<dyn Clock>,
    scheduler: Box<dyn FrameScheduler>,
    signals: SignalTx,
    events: EventSink,
    looping: Option<LoopRegion>,

    node: Option<B::Node>,
    /// The node whose natural end is still reported.
    armed: Option<NodeId>,
    next_node: u64,

    buffer: Option<SharedPlayBuffer>,
    duration: Option<f64>,

    cursor: f64,
    started_at: Option<Instant>,
    state: PlaybackState,
}

impl<B: RenderBackend> PlaybackController<B> {
    pub(crate) fn new(
        backend: B,
        clock: Arc<dyn Clock>,
        scheduler: Box<dyn FrameScheduler>,
        signals: SignalTx,
        events: EventSink,
        looping: Option<LoopRegion>,
    ) -> Self {
        Self {
            backend,
            clock,
            scheduler,
            signals,
            events,
            looping,
            node: None,
            armed: None,
            next_node: 0,
            buffer: None,
            duration: None,
            cursor: 0.0,
            started_at: None,
            state: PlaybackState::Idle,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn buffer(&self) -> Option<SharedPlayBuffer> {
        self.buffer.clone()
    }

    pub fn volume(&self) -> f32 {
        self.backend.gain()
    }

    pub fn set_volume(&self, volume: f32) {
        self.backend.set_gain(volume);
    }

    /// Returns `true` when playback actually started.
    pub fn play(&mut self) -> bool {
        if self.is_playing() {
            return false;
        }
        self.state = PlaybackState::Playing;
        self.start_node();
        self.scheduler
            .schedule(FrameTicker::new(self.signals.clone()));
        tracing::debug!(cursor = self.cursor, "playing");
        self.events.emit(PlayerEvent::TimeUpdate(self.position()));
        true
    }

    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.state = PlaybackState::Paused;
        self.halt_node();
        self.cursor += self.elapsed();
        self.started_at = None;
        tracing::debug!(cursor = self.cursor, "paused");
        self.events.emit(PlayerEvent::TimeUpdate(self.cursor));
        self.scheduler.cancel();
    }

    /// Pause, then force the end transition even though pausing suppressed it.
    pub fn stop(&mut self) {
        self.pause();
        self.ended();
    }

    /// Detach the render graph. Playback state returns to idle without events.
    pub fn dispose(&mut self) {
        self.halt_node();
        if self.is_playing() {
            self.cursor += self.elapsed();
        }
        self.started_at = None;
        self.state = PlaybackState::Idle;
        self.scheduler.cancel();
        self.buffer = None;
    }

    /// Make newly decoded data playable.
    pub fn bind(&mut self, buffer: SharedPlayBuffer, duration: f64) {
        self.duration = Some(duration);
        if self.buffer.is_some() {
            return;
        }
        self.buffer = Some(Arc::clone(&buffer));
        if self.is_playing() {
            let resume_at = self.position();
            if let Some(node) = self.node.as_mut() {
                tracing::debug!(node = %node.id(), resume_at, "binding buffer to playing node");
                node.set_buffer(buffer, resume_at);
            }
        }
    }

    pub fn on_frame(&mut self) {
        if self.is_playing() {
            self.events.emit(PlayerEvent::TimeUpdate(self.position()));
        }
    }

    pub fn on_node_ended(&mut self, node: NodeId) {
        if self.armed != Some(node) || !self.is_playing() {
            tracing::trace!(%node, "ignoring end of detached node");
            return;
        }
        self.armed = None;
        if let Some(mut finished) = self.node.take() {
            finished.disconnect();
        }
        self.ended();
    }

    /// Instantaneous position, wrapped into the duration once known.
    pub fn position(&self) -> f64 {
        let mut position = self.cursor + self.elapsed();
        if let Some(duration) = self.duration.filter(|d| *d > 0.0) {
            if position > duration {
                position %= duration;
            }
        }
        position
    }

    pub fn current_time(&self) -> f64 {
        self.position()
    }

    /// Move the cursor. While playing the render node restarts at `time`.
    pub fn set_current_time(&mut self, time: f64) {
        let time = time.max(0.0);
        if self.is_playing() {
            self.halt_node();
            self.cursor = time;
            self.start_node();
        } else {
            self.cursor = time;
        }
    }

    fn start_node(&mut self) {
        if let Some(mut old) = self.node.take() {
            old.disconnect();
        }

        let id = NodeId(self.next_node);
        self.next_node += 1;
        let mut node = self
            .backend
            .create_source(EndedSignal::new(id, self.signals.clone()));

        if let Some(duration) = self.duration.filter(|d| *d > 0.0) {
            if self.cursor > duration {
                self.cursor %= duration;
            }
        }

        if let Some(buffer) = &self.buffer {
            node.set_buffer(Arc::clone(buffer), self.cursor);
        }
        if let Some(region) = self.looping {
            node.set_loop(region);
        }

        node.start(self.cursor);
        self.started_at = Some(self.clock.now());
        self.armed = Some(id);
        self.node = Some(node);
    }

    fn halt_node(&mut self) {
        self.armed = None;
        if let Some(mut node) = self.node.take() {
            node.stop();
            node.disconnect();
        }
    }

    fn ended(&mut self) {
        tracing::debug!("playback ended");
        self.events.emit(PlayerEvent::End);
        self.state = PlaybackState::Idle;
        self.scheduler.cancel();
        self.armed = None;
        self.cursor = 0.0;
        self.started_at = None;
        self.events.emit(PlayerEvent::TimeUpdate(self.cursor));
    }

    fn elapsed(&self) -> f64 {
        self.started_at
            .map(|start| {
                self.clock
                    .now()
                    .saturating_duration_since(start)
                    .as_secs_f64()
            })
            .unwrap_or(0.0)
    }
}
