use std::sync::Arc;

use parking_lot::RwLock;

/// Audio decoded from the downloaded prefix of the resource.
///
/// Samples are planar: one `Vec` per channel, normalized to [-1.0, 1.0].
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
    /// Duration in seconds.
    pub duration: f64,
}

impl DecodedAudio {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.first().map_or(0, Vec::len);
        let duration = if sample_rate == 0 {
            0.0
        } else {
            frames as f64 / sample_rate as f64
        };
        Self {
            channels,
            sample_rate,
            duration,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Total number of frames (samples per channel).
    pub fn num_frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Split interleaved samples into per-channel arrays.
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        let channel_count = channel_count.max(1);
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (c, &s) in frame.iter().enumerate() {
                channels[c].push(s);
            }
        }
        Self::new(channels, sample_rate)
    }
}

/// The session's single fixed-size sample buffer.
#[derive(Clone, Debug)]
pub struct PlayBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

/// The play buffer as shared between the session and the render backend.
pub type SharedPlayBuffer = Arc<RwLock<PlayBuffer>>;

impl PlayBuffer {
    /// Silent buffer of `frames` samples per channel.
    pub fn new(channel_count: usize, frames: usize, sample_rate: u32) -> Self {
        Self {
            channels: vec![vec![0.0; frames]; channel_count],
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }
}

/// Loop bounds in seconds; `None` means the buffer start or end.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopRegion {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// Current playback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Coarse readiness, numbered like media-element ready states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum ReadyState {
    #[default]
    HaveNothing = 0,
    HaveEnoughData = 4,
}

impl ReadyState {
    pub fn level(self) -> u8 {
        self as u8
    }
}
