//! Shared helpers for the integration tests: a WAV generator, an in-memory
//! range transport, a scripted decoder and a recording render backend.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant as StdInstant};

use bytes::Bytes;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use progressive_audio::{
    ByteRange, DecodeBackend, DecodedAudio, EndedSignal, LoopRegion, NodeId, PlayerError,
    PlayerEvent, PlayerResult, ProgressSink, RangeResponse, RangeTransport, RenderBackend,
    SharedPlayBuffer, SourceNode,
};

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Mono 16-bit PCM WAV with a sine tone.
pub fn sine_wav(sample_rate: u32, seconds: f32, freq: f32) -> Vec<u8> {
    let frames = (sample_rate as f32 * seconds) as u32;
    let data_len = frames * 2;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = (t * freq * std::f32::consts::TAU).sin() * 0.5;
        out.extend_from_slice(&((sample * i16::MAX as f32) as i16).to_le_bytes());
    }
    out
}

/// Serves range requests from a byte vector.
#[derive(Clone)]
pub struct MemoryTransport {
    data: Arc<Vec<u8>>,
    status: u16,
    omit_content_range: bool,
    requests: Arc<Mutex<Vec<ByteRange>>>,
}

impl MemoryTransport {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
            status: 206,
            omit_content_range: false,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Bytes of the given length; contents are irrelevant to scripted decoders.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn without_content_range(mut self) -> Self {
        self.omit_content_range = true;
        self
    }

    pub fn requests(&self) -> Vec<ByteRange> {
        self.requests.lock().clone()
    }
}

impl RangeTransport for MemoryTransport {
    fn fetch(
        &self,
        _url: &str,
        range: ByteRange,
        progress: ProgressSink,
    ) -> impl Future<Output = PlayerResult<RangeResponse>> + Send {
        self.requests.lock().push(range);
        let data = Arc::clone(&self.data);
        let status = self.status;
        let omit = self.omit_content_range;

        async move {
            let len = data.len();
            let start = (range.start as usize).min(len);
            let end = range.end.map_or(len, |e| (e as usize).min(len));
            let body = Bytes::copy_from_slice(&data[start..end]);
            progress.report(body.len() as u64, Some(len as u64));

            let content_range = (!omit).then(|| {
                format!("bytes {}-{}/{}", start, end.saturating_sub(1), len)
            });
            Ok(RangeResponse {
                status,
                content_range,
                body,
            })
        }
    }
}

/// Decodes `bytes.len() * seconds_per_byte` seconds of silence at 100 Hz.
#[derive(Clone)]
pub struct ScriptedDecoder {
    seconds_per_byte: f64,
    /// Number of calls that succeed before every later one fails.
    fail_after: Option<usize>,
    inputs: Arc<Mutex<Vec<usize>>>,
}

pub const SCRIPTED_RATE: u32 = 100;

impl ScriptedDecoder {
    pub fn new(seconds_per_byte: f64) -> Self {
        Self {
            seconds_per_byte,
            fail_after: None,
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_after: Some(0),
            ..Self::new(0.0)
        }
    }

    pub fn fail_after(mut self, successes: usize) -> Self {
        self.fail_after = Some(successes);
        self
    }

    /// Length of every byte slice handed to the decoder, in call order.
    pub fn inputs(&self) -> Vec<usize> {
        self.inputs.lock().clone()
    }
}

impl DecodeBackend for ScriptedDecoder {
    fn decode(&self, bytes: &[u8]) -> PlayerResult<DecodedAudio> {
        let call = {
            let mut inputs = self.inputs.lock();
            inputs.push(bytes.len());
            inputs.len()
        };
        if self.fail_after.is_some_and(|n| call > n) {
            return Err(PlayerError::Decode("scripted failure".into()));
        }
        let frames =
            (bytes.len() as f64 * self.seconds_per_byte * SCRIPTED_RATE as f64).round() as usize;
        Ok(DecodedAudio::new(
            vec![vec![0.0; frames], vec![0.0; frames]],
            SCRIPTED_RATE,
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeCall {
    Create(NodeId),
    Buffer(NodeId, f64),
    Loop(NodeId, LoopRegion),
    Start(NodeId, f64),
    Stop(NodeId),
    Disconnect(NodeId),
}

/// Render backend that records node operations instead of producing sound.
#[derive(Clone)]
pub struct RecordingBackend {
    calls: Arc<Mutex<Vec<NodeCall>>>,
    ended: Arc<Mutex<Vec<EndedSignal>>>,
    gain: Arc<AtomicU32>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            ended: Arc::new(Mutex::new(Vec::new())),
            gain: Arc::new(AtomicU32::new(1.0f32.to_bits())),
        }
    }
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<NodeCall> {
        self.calls.lock().clone()
    }

    pub fn starts(&self) -> Vec<(NodeId, f64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                NodeCall::Start(id, offset) => Some((id, offset)),
                _ => None,
            })
            .collect()
    }

    /// Simulate the most recently created node playing to its end.
    pub fn finish_latest(&self) {
        if let Some(signal) = self.ended.lock().last() {
            signal.fire();
        }
    }
}

pub struct RecordingNode {
    id: NodeId,
    calls: Arc<Mutex<Vec<NodeCall>>>,
}

impl SourceNode for RecordingNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn set_buffer(&mut self, _buffer: SharedPlayBuffer, resume_at: f64) {
        self.calls.lock().push(NodeCall::Buffer(self.id, resume_at));
    }

    fn set_loop(&mut self, region: LoopRegion) {
        self.calls.lock().push(NodeCall::Loop(self.id, region));
    }

    fn start(&mut self, offset: f64) {
        self.calls.lock().push(NodeCall::Start(self.id, offset));
    }

    fn stop(&mut self) {
        self.calls.lock().push(NodeCall::Stop(self.id));
    }

    fn disconnect(&mut self) {
        self.calls.lock().push(NodeCall::Disconnect(self.id));
    }
}

impl RenderBackend for RecordingBackend {
    type Node = RecordingNode;

    fn create_source(&self, ended: EndedSignal) -> RecordingNode {
        let id = ended.node();
        self.calls.lock().push(NodeCall::Create(id));
        self.ended.lock().push(ended);
        RecordingNode {
            id,
            calls: Arc::clone(&self.calls),
        }
    }

    fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::SeqCst))
    }

    fn set_gain(&self, gain: f32) {
        self.gain.store(gain.to_bits(), Ordering::SeqCst);
    }
}

/// Collects events until one matches `stop`, yielding to the runtime in
/// between. Panics after a few seconds of real time.
pub async fn collect_until(
    rx: &Receiver<PlayerEvent>,
    stop: impl Fn(&PlayerEvent) -> bool,
) -> Vec<PlayerEvent> {
    let deadline = StdInstant::now() + Duration::from_secs(10);
    let mut seen = Vec::new();
    loop {
        while let Ok(event) = rx.try_recv() {
            let done = stop(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
        assert!(
            StdInstant::now() < deadline,
            "timed out waiting for event; saw {seen:?}"
        );
        tokio::task::yield_now().await;
    }
}

/// Everything currently queued on `rx`.
pub fn drain(rx: &Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    rx.try_iter().collect()
}

/// Yield until `condition` holds. Panics after a few seconds of real time.
pub async fn wait_for(condition: impl Fn() -> bool) {
    let deadline = StdInstant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(StdInstant::now() < deadline, "condition never became true");
        tokio::task::yield_now().await;
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}
