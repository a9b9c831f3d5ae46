use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::types::{LoopRegion, SharedPlayBuffer};
use crate::error::{PlayerError, PlayerResult};
use crate::playback::{EndedSignal, NodeId, RenderBackend, SourceNode};

/// Commands queued between two device callbacks.
const COMMAND_CAPACITY: usize = 64;

enum EngineCommand {
    Start {
        node: NodeId,
        buffer: Option<SharedPlayBuffer>,
        offset: f64,
        looping: Option<LoopRegion>,
        ended: EndedSignal,
    },
    Bind {
        node: NodeId,
        buffer: SharedPlayBuffer,
        offset: f64,
    },
    Stop(NodeId),
}

/// The one source node currently rendering.
struct Voice {
    node: NodeId,
    buffer: Option<SharedPlayBuffer>,
    /// Start offset in seconds, resolved to a frame position on first render.
    offset: f64,
    /// Fractional frame position in the buffer's sample rate.
    position: Option<f64>,
    looping: Option<LoopRegion>,
    ended: EndedSignal,
}

struct EngineState {
    voice: Option<Voice>,
    gain: Arc<AtomicU32>,
    output_sample_rate: u32,
}

impl EngineState {
    fn new(output_sample_rate: u32, gain: Arc<AtomicU32>) -> Self {
        Self {
            voice: None,
            gain,
            output_sample_rate,
        }
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Start {
                node,
                buffer,
                offset,
                looping,
                ended,
            } => {
                self.voice = Some(Voice {
                    node,
                    buffer,
                    offset,
                    position: None,
                    looping,
                    ended,
                });
            }
            EngineCommand::Bind {
                node,
                buffer,
                offset,
            } => {
                if let Some(voice) = self.voice.as_mut().filter(|v| v.node == node) {
                    voice.buffer = Some(buffer);
                    voice.offset = offset;
                    voice.position = None;
                }
            }
            EngineCommand::Stop(node) => {
                if self.voice.as_ref().is_some_and(|v| v.node == node) {
                    self.voice = None;
                }
            }
        }
    }

    /// Fill the interleaved device buffer from the play buffer.
    fn fill_buffer(&mut self, output: &mut [f32], channels: u16) {
        output.fill(0.0);

        let gain = f32::from_bits(self.gain.load(Ordering::Relaxed));
        let output_rate = self.output_sample_rate.max(1) as f64;
        let out_channels = channels.max(1) as usize;

        let Some(voice) = self.voice.as_mut() else {
            return;
        };
        // Without data the node plays silence until a buffer is bound.
        let Some(shared) = voice.buffer.clone() else {
            return;
        };
        // A merge is in progress; skip this period rather than block the device.
        let Some(buffer) = shared.try_read() else {
            return;
        };

        let rate = buffer.sample_rate() as f64;
        let len = buffer.len();
        let audio_channels = buffer.channel_count();
        let step = rate / output_rate;

        let bounds = voice.looping.map(|region| {
            let start = region.start.map_or(0.0, |s| s * rate).clamp(0.0, len as f64);
            let end = region
                .end
                .map_or(len as f64, |e| e * rate)
                .clamp(0.0, len as f64);
            if end > start {
                (start, end)
            } else {
                (0.0, len as f64)
            }
        });

        let position = voice.position.get_or_insert(voice.offset * rate);
        let mut finished = false;

        for frame in output.chunks_exact_mut(out_channels) {
            if let Some((start, end)) = bounds {
                if *position >= end && end > start {
                    *position = start + (*position - end) % (end - start);
                }
            }

            let index = *position as usize;
            if index >= len || audio_channels == 0 {
                if bounds.is_none() {
                    finished = true;
                }
                break;
            }

            for (c, sample) in frame.iter_mut().enumerate() {
                *sample = buffer.channel(c % audio_channels)[index] * gain;
            }
            *position += step;
        }

        drop(buffer);
        if finished {
            if let Some(voice) = self.voice.take() {
                tracing::trace!(node = %voice.node, "source node reached end of buffer");
                voice.ended.fire();
            }
        }
    }
}

/// Render backend on the default cpal output device.
///
/// The stream lives on a dedicated thread until every clone of the backend
/// is dropped.
#[derive(Clone)]
pub struct CpalBackend {
    cmd_tx: Sender<EngineCommand>,
    gain: Arc<AtomicU32>,
    _keepalive: Sender<()>,
}

impl CpalBackend {
    /// Open the default output device and start its stream.
    pub fn spawn() -> PlayerResult<Self> {
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<EngineCommand>(COMMAND_CAPACITY);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<u32, String>>(1);
        let (keepalive_tx, keepalive_rx) = crossbeam_channel::bounded::<()>(0);
        let gain = Arc::new(AtomicU32::new(1.0f32.to_bits()));
        let engine_gain = Arc::clone(&gain);

        std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || {
                let stream = match build_stream(cmd_rx, engine_gain) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Returns once every backend handle is gone.
                let _ = keepalive_rx.recv();
                drop(stream);
                tracing::debug!("audio output stream closed");
            })
            .map_err(|e| PlayerError::Backend(format!("failed to spawn audio thread: {e}")))?;

        let output_sample_rate = ready_rx
            .recv()
            .map_err(|_| PlayerError::Backend("audio thread exited during setup".into()))?
            .map_err(PlayerError::Backend)?;

        tracing::debug!(output_sample_rate, "audio output ready");
        Ok(Self {
            cmd_tx,
            gain,
            _keepalive: keepalive_tx,
        })
    }
}

fn build_stream(
    cmd_rx: Receiver<EngineCommand>,
    gain: Arc<AtomicU32>,
) -> Result<(cpal::Stream, u32), String> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("No audio output device found")?;

    let config = device
        .default_output_config()
        .map_err(|e| format!("Failed to get output config: {e}"))?;

    let sample_rate = config.sample_rate();
    let channels = config.channels();
    let sample_format = config.sample_format();

    let mut state = EngineState::new(sample_rate, gain);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while let Ok(cmd) = cmd_rx.try_recv() {
                        state.handle_command(cmd);
                    }
                    state.fill_buffer(data, channels);
                },
                |err| {
                    tracing::error!("audio stream error: {err}");
                },
                None,
            )
            .map_err(|e| format!("Failed to build output stream: {e}"))?,
        _ => return Err(format!("Unsupported sample format: {sample_format:?}")),
    };

    stream
        .play()
        .map_err(|e| format!("Failed to start stream: {e}"))?;

    Ok((stream, sample_rate))
}

impl RenderBackend for CpalBackend {
    type Node = CpalNode;

    fn create_source(&self, ended: EndedSignal) -> CpalNode {
        CpalNode {
            id: ended.node(),
            cmd_tx: self.cmd_tx.clone(),
            ended: Some(ended),
            buffer: None,
            looping: None,
            started: false,
            stopped: false,
        }
    }

    fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    fn set_gain(&self, gain: f32) {
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
    }
}

/// Source node handle; configuration is sent to the engine on `start`.
pub struct CpalNode {
    id: NodeId,
    cmd_tx: Sender<EngineCommand>,
    ended: Option<EndedSignal>,
    buffer: Option<SharedPlayBuffer>,
    looping: Option<LoopRegion>,
    started: bool,
    stopped: bool,
}

impl CpalNode {
    /// Never blocks; a full queue means the device callback has stalled.
    fn send(&self, cmd: EngineCommand) {
        match self.cmd_tx.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(node = %self.id, "audio engine command queue full, dropping command");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!(node = %self.id, "audio engine is gone");
            }
        }
    }
}

impl SourceNode for CpalNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn set_buffer(&mut self, buffer: SharedPlayBuffer, resume_at: f64) {
        if self.started && !self.stopped {
            self.send(EngineCommand::Bind {
                node: self.id,
                buffer,
                offset: resume_at,
            });
        } else {
            self.buffer = Some(buffer);
        }
    }

    fn set_loop(&mut self, region: LoopRegion) {
        self.looping = Some(region);
    }

    fn start(&mut self, offset: f64) {
        let Some(ended) = self.ended.take() else {
            return;
        };
        self.started = true;
        let buffer = self.buffer.take();
        self.send(EngineCommand::Start {
            node: self.id,
            buffer,
            offset,
            looping: self.looping,
            ended,
        });
    }

    fn stop(&mut self) {
        if self.started && !self.stopped {
            self.stopped = true;
            self.send(EngineCommand::Stop(self.id));
        }
    }

    fn disconnect(&mut self) {
        self.stop();
    }
}
