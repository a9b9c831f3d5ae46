use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::types::DecodedAudio;
use crate::error::{PlayerError, PlayerResult};
use crate::source::extension_from_url;

/// Turns raw container bytes into samples.
pub trait DecodeBackend: Send + Sync + 'static {
    fn decode(&self, bytes: &[u8]) -> PlayerResult<DecodedAudio>;
}

/// Outcome of the optional pre-decode transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreDecode {
    /// Decode these bytes instead of the accumulator.
    Replace(Vec<u8>),
    /// Decode the accumulator as downloaded.
    UseOriginal,
}

/// User-supplied transform run on the raw bytes before every decode.
pub type PreDecodeFn = Arc<dyn Fn(&[u8]) -> PreDecode + Send + Sync>;

/// Linear projection of the full duration from a decoded prefix.
///
/// Exact when the prefix is the whole resource.
pub fn extrapolate_duration(decoded_duration: f64, chunk_bytes: u64, total_bytes: u64) -> f64 {
    if chunk_bytes >= total_bytes || chunk_bytes == 0 {
        return decoded_duration;
    }
    decoded_duration * total_bytes as f64 / chunk_bytes as f64
}

/// Decodes the whole downloaded prefix on every chunk.
///
/// Partial frames at chunk boundaries make decoding only the newest chunk
/// unreliable, so each call starts from byte 0. Over a full download this
/// costs O(n²) decoded bytes.
pub struct IncrementalDecoder<D> {
    backend: Arc<D>,
    pre_decode: Option<PreDecodeFn>,
    estimated_duration: Option<f64>,
}

impl<D: DecodeBackend> IncrementalDecoder<D> {
    pub fn new(backend: D) -> Self {
        Self {
            backend: Arc::new(backend),
            pre_decode: None,
            estimated_duration: None,
        }
    }

    pub fn with_pre_decode(mut self, pre_decode: Option<PreDecodeFn>) -> Self {
        self.pre_decode = pre_decode;
        self
    }

    pub fn backend(&self) -> Arc<D> {
        Arc::clone(&self.backend)
    }

    /// The bytes the backend should see: the transform's replacement, or the
    /// accumulator itself.
    pub fn prepare(&self, raw: Bytes) -> Bytes {
        match self.pre_decode.as_ref().map(|f| f(&raw)) {
            Some(PreDecode::Replace(bytes)) => Bytes::from(bytes),
            Some(PreDecode::UseOriginal) | None => raw,
        }
    }

    /// Apply the transform and decode synchronously.
    pub fn decode(&self, raw: Bytes) -> PlayerResult<DecodedAudio> {
        self.backend.decode(&self.prepare(raw))
    }

    /// Fix the total duration from the first decode with audible content and
    /// keep returning that value afterwards.
    pub fn estimate_duration(
        &mut self,
        decoded: &DecodedAudio,
        chunk_bytes: u64,
        total_bytes: u64,
    ) -> Option<f64> {
        if self.estimated_duration.is_none() && decoded.num_frames() > 0 {
            let estimate = extrapolate_duration(decoded.duration, chunk_bytes, total_bytes);
            tracing::debug!(
                decoded = decoded.duration,
                chunk_bytes,
                total_bytes,
                estimate,
                "duration estimate fixed"
            );
            self.estimated_duration = Some(estimate);
        }
        self.estimated_duration
    }

    pub fn estimated_duration(&self) -> Option<f64> {
        self.estimated_duration
    }
}

/// Symphonia-backed decoder for an in-memory byte prefix.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder {
    extension: Option<String>,
}

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container hint, e.g. `"mp3"`.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Hint taken from the URL's file extension, if any.
    pub fn for_url(url: &str) -> Self {
        Self {
            extension: extension_from_url(url),
        }
    }
}

impl DecodeBackend for SymphoniaDecoder {
    fn decode(&self, bytes: &[u8]) -> PlayerResult<DecodedAudio> {
        decode_bytes(bytes.to_vec(), self.extension.as_deref())
    }
}

/// Decode as much of `bytes` as forms complete packets.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> PlayerResult<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| PlayerError::Decode(format!("failed to probe format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| PlayerError::Decode("no default track found".into()))?
        .clone();

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PlayerError::Decode("no sample rate in track".into()))?;
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PlayerError::Decode(format!("failed to create decoder: {e}")))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            // The prefix ends mid-stream; everything before it is usable.
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(PlayerError::Decode(format!("error reading packet: {e}"))),
        };

        if packet.track_id() != track.id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("skipping undecodable packet: {e}");
                continue;
            }
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(PlayerError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        let num_frames = decoded.capacity();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    let audio = DecodedAudio::from_interleaved(&samples, channels, sample_rate);
    tracing::trace!(
        frames = audio.num_frames(),
        channels = audio.channel_count(),
        sample_rate,
        "decoded prefix"
    );
    Ok(audio)
}
