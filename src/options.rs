//! Settings for a progressive playback session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{LoopRegion, PreDecode, PreDecodeFn};
use crate::fetch::DEFAULT_CHUNK_SIZE;
use crate::playback::DEFAULT_FRAME_INTERVAL;

/// Pause between background chunk fetches.
pub const DEFAULT_CONTINUATION_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct PlayerOptions {
    /// Bytes per range request. Default: 5 MB.
    pub max_chunk_size: u64,

    /// Delay between a decode finishing and the next background fetch.
    /// Default: 1 s.
    pub continuation_delay: Duration,

    /// Period of `TimeUpdate` reports while playing. Default: 16 ms.
    pub frame_interval: Duration,

    pub looping: bool,
    pub loop_start: Option<f64>,
    pub loop_end: Option<f64>,

    /// Initial gain; the backend default is kept when `None`.
    pub volume: Option<f32>,

    /// Transform applied to the accumulated bytes before every decode.
    pub pre_decode: Option<PreDecodeFn>,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_CHUNK_SIZE,
            continuation_delay: DEFAULT_CONTINUATION_DELAY,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            looping: false,
            loop_start: None,
            loop_end: None,
            volume: None,
            pre_decode: None,
        }
    }
}

impl fmt::Debug for PlayerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerOptions")
            .field("max_chunk_size", &self.max_chunk_size)
            .field("continuation_delay", &self.continuation_delay)
            .field("frame_interval", &self.frame_interval)
            .field("looping", &self.looping)
            .field("loop_start", &self.loop_start)
            .field("loop_end", &self.loop_end)
            .field("volume", &self.volume)
            .field("pre_decode", &self.pre_decode.is_some())
            .finish()
    }
}

impl PlayerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_chunk_size(mut self, bytes: u64) -> Self {
        self.max_chunk_size = bytes;
        self
    }

    pub fn with_continuation_delay(mut self, delay: Duration) -> Self {
        self.continuation_delay = delay;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Enable looping between `start` and `end` seconds.
    pub fn with_loop_region(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.looping = true;
        self.loop_start = start;
        self.loop_end = end;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_pre_decode<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8]) -> PreDecode + Send + Sync + 'static,
    {
        self.pre_decode = Some(Arc::new(f));
        self
    }

    /// Loop bounds to apply to each render node, if looping.
    pub fn loop_region(&self) -> Option<LoopRegion> {
        self.looping.then_some(LoopRegion {
            start: self.loop_start,
            end: self.loop_end,
        })
    }
}
