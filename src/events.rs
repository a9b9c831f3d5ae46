use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::error::PlayerError;

/// Notifications emitted by a [`crate::ProgressivePlaybackSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Bytes received so far and the total size of the resource (0 while unknown).
    Progress { loaded: u64, total: u64 },
    /// A decode of the accumulated bytes is about to start. `bytes` is
    /// everything downloaded so far, before the pre-decode transform.
    Decoding { bytes: Bytes },
    /// A decode finished; `decoded_duration` covers the downloaded prefix.
    Decoded { decoded_duration: f64, downloaded: u64 },
    /// Duration of the first decoded prefix. Emitted once.
    LoadedDuration(f64),
    /// Enough data is available to play. Emitted once.
    Load,
    /// Current playback position in seconds.
    TimeUpdate(f64),
    /// Playback reached its end or was stopped.
    End,
    Error(PlayerError),
}

/// Fan-out of [`PlayerEvent`]s to every subscriber.
///
/// Disconnected subscribers are pruned on the next emit.
#[derive(Clone, Default)]
pub struct EventSink {
    subscribers: Arc<Mutex<Vec<Sender<PlayerEvent>>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: PlayerEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
