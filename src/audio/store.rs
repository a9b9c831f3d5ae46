use std::sync::Arc;

use parking_lot::RwLock;

use super::types::{DecodedAudio, PlayBuffer, SharedPlayBuffer};

/// Owns the play buffer and copies decoded prefixes into it.
///
/// The buffer is sized once from the estimated duration and never resized.
/// Decoded audio past its end is dropped.
#[derive(Default)]
pub struct SampleBufferStore {
    buffer: Option<SharedPlayBuffer>,
}

impl SampleBufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the buffer on first call; later calls return the existing one.
    pub fn ensure_allocated(
        &mut self,
        channel_count: usize,
        estimated_duration: f64,
        sample_rate: u32,
    ) -> SharedPlayBuffer {
        if let Some(buffer) = &self.buffer {
            return Arc::clone(buffer);
        }

        let frames = (estimated_duration.max(0.0) * sample_rate as f64) as usize;
        tracing::debug!(channel_count, frames, sample_rate, "allocating play buffer");
        let buffer = Arc::new(RwLock::new(PlayBuffer::new(
            channel_count,
            frames,
            sample_rate,
        )));
        self.buffer = Some(Arc::clone(&buffer));
        buffer
    }

    /// Overwrite the buffer's prefix with the decoded samples.
    ///
    /// Returns the number of frames copied per channel.
    pub fn merge_decoded(&self, decoded: &DecodedAudio) -> usize {
        let Some(buffer) = &self.buffer else {
            return 0;
        };
        let mut buffer = buffer.write();

        let len = decoded.num_frames().min(buffer.len());
        let channels = decoded.channel_count().min(buffer.channel_count());
        for (c, source) in decoded.channels.iter().take(channels).enumerate() {
            buffer.channel_mut(c)[..len].copy_from_slice(&source[..len]);
        }
        len
    }

    pub fn buffer(&self) -> Option<SharedPlayBuffer> {
        self.buffer.clone()
    }
}
