//! Progressive playback session.
//!
//! Control flow: the first range request starts at construction; every
//! accepted chunk triggers a decode of the whole accumulator; every decode
//! refreshes the play buffer and the controller. The first `play()` arms
//! background streaming: after each decode the next range is fetched after
//! `continuation_delay`, with at most one request in flight.
//!
//! All state lives behind one mutex. Network responses, decode results,
//! timers, frame ticks and node endings are queued on a channel and applied by
//! a single driver task, so state is only ever touched by one caller at a time
//! and no control call blocks on I/O.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::audio::{
    CpalBackend, DecodeBackend, DecodedAudio, IncrementalDecoder, PlaybackState, ReadyState,
    SampleBufferStore, SharedPlayBuffer, SymphoniaDecoder,
};
use crate::error::{PlayerError, PlayerResult};
use crate::events::{EventSink, PlayerEvent};
use crate::fetch::{
    ChunkReceipt, ChunkedFetcher, HttpTransport, ProgressSink, RangeResponse, RangeTransport,
};
use crate::options::PlayerOptions;
use crate::playback::{
    Clock, FrameScheduler, IntervalScheduler, PlaybackController, RenderBackend, TokioClock,
};
use crate::signal::{Signal, SignalTx};
use crate::source::{select_playable, SourceCandidate};

/// Streams, decodes and plays one remote audio resource.
///
/// Cloning yields another handle to the same session.
pub struct ProgressivePlaybackSession<T, B: RenderBackend, D> {
    inner: Arc<Mutex<SessionInner<T, B, D>>>,
    events: EventSink,
}

impl<T, B: RenderBackend, D> Clone for ProgressivePlaybackSession<T, B, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            events: self.events.clone(),
        }
    }
}

impl ProgressivePlaybackSession<HttpTransport, CpalBackend, SymphoniaDecoder> {
    /// Session over HTTP on the default output device.
    pub fn open(
        candidates: impl IntoIterator<Item = impl Into<SourceCandidate>>,
        options: PlayerOptions,
    ) -> PlayerResult<(Self, Receiver<PlayerEvent>)> {
        let candidates: Vec<SourceCandidate> = candidates.into_iter().map(Into::into).collect();
        let decoder = select_playable(&candidates)
            .map(|c| SymphoniaDecoder::for_url(&c.src))
            .unwrap_or_default();
        let backend = CpalBackend::spawn()?;
        Ok(SessionBuilder::new(candidates, options).build(
            HttpTransport::default(),
            backend,
            decoder,
        ))
    }
}

impl<T, B, D> ProgressivePlaybackSession<T, B, D>
where
    T: RangeTransport,
    B: RenderBackend,
    D: DecodeBackend,
{
    /// Start loading the first playable candidate.
    ///
    /// Must be called within a tokio runtime. The returned receiver observes
    /// every event, including a `NoPlayableSource` error.
    pub fn new(
        candidates: impl IntoIterator<Item = impl Into<SourceCandidate>>,
        options: PlayerOptions,
        transport: T,
        backend: B,
        decoder: D,
    ) -> (Self, Receiver<PlayerEvent>) {
        SessionBuilder::new(candidates, options).build(transport, backend, decoder)
    }

    pub fn play(&self) {
        let mut inner = self.inner.lock();
        inner.attach_buffer();
        if inner.controller.play() && !inner.streaming {
            inner.start_fetch(true);
        }
    }

    pub fn pause(&self) {
        self.inner.lock().controller.pause();
    }

    pub fn stop(&self) {
        self.inner.lock().controller.stop();
    }

    /// Tear down the render graph. Downloads already under way are not
    /// cancelled and keep filling the same play buffer, which a later `play()`
    /// picks up again.
    pub fn dispose(&self) {
        self.inner.lock().controller.dispose();
    }

    pub fn current_time(&self) -> f64 {
        self.inner.lock().controller.current_time()
    }

    pub fn set_current_time(&self, seconds: f64) {
        self.inner.lock().controller.set_current_time(seconds);
    }

    /// Estimated total duration, known after the first decode.
    pub fn duration(&self) -> Option<f64> {
        self.inner.lock().controller.duration()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.lock().ready_state
    }

    pub fn playing(&self) -> bool {
        self.inner.lock().controller.is_playing()
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().controller.state()
    }

    pub fn buffer(&self) -> Option<SharedPlayBuffer> {
        self.inner.lock().store.buffer()
    }

    pub fn volume(&self) -> f32 {
        self.inner.lock().controller.volume()
    }

    pub fn set_volume(&self, volume: f32) {
        self.inner.lock().controller.set_volume(volume);
    }

    /// Bytes downloaded so far.
    pub fn downloaded(&self) -> u64 {
        self.inner
            .lock()
            .fetcher
            .as_ref()
            .map_or(0, ChunkedFetcher::downloaded)
    }

    /// Resource size; 0 until the first response.
    pub fn total_length(&self) -> u64 {
        self.inner
            .lock()
            .fetcher
            .as_ref()
            .map_or(0, ChunkedFetcher::total)
    }

    /// Additional event receiver; sees events emitted from now on.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

/// Configures clock and frame scheduler before building a session.
pub struct SessionBuilder {
    candidates: Vec<SourceCandidate>,
    options: PlayerOptions,
    clock: Option<Arc<dyn Clock>>,
    scheduler: Option<Box<dyn FrameScheduler>>,
}

impl SessionBuilder {
    pub fn new(
        candidates: impl IntoIterator<Item = impl Into<SourceCandidate>>,
        options: PlayerOptions,
    ) -> Self {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            options,
            clock: None,
            scheduler: None,
        }
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn scheduler(mut self, scheduler: impl FrameScheduler) -> Self {
        self.scheduler = Some(Box::new(scheduler));
        self
    }

    /// Must be called within a tokio runtime.
    pub fn build<T, B, D>(
        self,
        transport: T,
        backend: B,
        decoder: D,
    ) -> (ProgressivePlaybackSession<T, B, D>, Receiver<PlayerEvent>)
    where
        T: RangeTransport,
        B: RenderBackend,
        D: DecodeBackend,
    {
        let runtime = Handle::current();
        let events = EventSink::new();
        let first = events.subscribe();
        let (signals, signal_rx) = mpsc::unbounded_channel();

        let options = self.options;
        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));
        let scheduler = self.scheduler.unwrap_or_else(|| {
            Box::new(IntervalScheduler::new(
                options.frame_interval,
                runtime.clone(),
            ))
        });

        let controller = PlaybackController::new(
            backend,
            clock,
            scheduler,
            signals.clone(),
            events.clone(),
            options.loop_region(),
        );
        if let Some(volume) = options.volume {
            controller.set_volume(volume);
        }

        let source = select_playable(&self.candidates).map(|c| c.src.clone());
        let fetcher = source
            .as_ref()
            .map(|url| ChunkedFetcher::new(url.clone(), options.max_chunk_size));

        let inner = Arc::new(Mutex::new(SessionInner {
            fetcher,
            decoder: IncrementalDecoder::new(decoder).with_pre_decode(options.pre_decode.clone()),
            store: SampleBufferStore::new(),
            controller,
            transport: Arc::new(transport),
            events: events.clone(),
            signals: signals.clone(),
            runtime: runtime.clone(),
            continuation_delay: options.continuation_delay,
            ready_state: ReadyState::HaveNothing,
            busy: false,
            streaming: false,
            halted: false,
        }));

        runtime.spawn(drive(Arc::downgrade(&inner), signal_rx));

        match source {
            Some(url) => {
                tracing::debug!(%url, "starting progressive load");
                inner.lock().start_fetch(false);
            }
            None => {
                let candidates = self.candidates.into_iter().map(|c| c.src).collect();
                let _ = signals.send(Signal::Failed(PlayerError::NoPlayableSource {
                    candidates,
                }));
            }
        }

        (ProgressivePlaybackSession { inner, events }, first)
    }
}

struct SessionInner<T, B: RenderBackend, D> {
    /// `None` when no candidate was playable.
    fetcher: Option<ChunkedFetcher>,
    decoder: IncrementalDecoder<D>,
    store: SampleBufferStore,
    controller: PlaybackController<B>,
    transport: Arc<T>,
    events: EventSink,
    signals: SignalTx,
    runtime: Handle,
    continuation_delay: Duration,
    ready_state: ReadyState,
    /// A request or the decode it triggered is pending.
    busy: bool,
    /// Background continuation has been armed by the first `play()`.
    streaming: bool,
    /// An error stopped forward progress.
    halted: bool,
}

impl<T, B, D> SessionInner<T, B, D>
where
    T: RangeTransport,
    B: RenderBackend,
    D: DecodeBackend,
{
    fn handle(&mut self, signal: Signal) {
        match signal {
            Signal::Fetched(result) => self.on_fetched(result),
            Signal::Decoded { receipt, result } => self.on_decoded(receipt, result),
            Signal::Continue => self.start_fetch(true),
            Signal::Frame => self.controller.on_frame(),
            Signal::NodeEnded(node) => self.controller.on_node_ended(node),
            Signal::Failed(err) => self.fail(err),
        }
    }

    /// Hand the existing play buffer to the controller if it lost it.
    fn attach_buffer(&mut self) {
        if let (Some(buffer), Some(estimate)) =
            (self.store.buffer(), self.decoder.estimated_duration())
        {
            self.controller.bind(buffer, estimate);
        }
    }

    /// Issue the next range request unless one is pending or the resource is
    /// complete. `recursive` arms background continuation.
    fn start_fetch(&mut self, recursive: bool) {
        if recursive {
            self.streaming = true;
        }
        if self.busy || self.halted {
            return;
        }
        let Some(fetcher) = self.fetcher.as_ref() else {
            return;
        };
        let Some(range) = fetcher.next_request() else {
            tracing::trace!("resource fully downloaded");
            return;
        };

        self.busy = true;
        let progress = ProgressSink::new(self.events.clone(), fetcher.downloaded(), fetcher.total());
        let transport = Arc::clone(&self.transport);
        let url = fetcher.url().to_string();
        let signals = self.signals.clone();

        self.runtime.spawn(async move {
            let result = transport.fetch(&url, range, progress).await;
            let _ = signals.send(Signal::Fetched(result));
        });
    }

    fn on_fetched(&mut self, result: PlayerResult<RangeResponse>) {
        let Some(fetcher) = self.fetcher.as_mut() else {
            return;
        };
        let receipt = match result.and_then(|response| fetcher.accept(response)) {
            Ok(receipt) => receipt,
            Err(e) => return self.fail(e),
        };

        let raw = fetcher.snapshot();
        self.events.emit(PlayerEvent::Decoding { bytes: raw.clone() });
        let prepared = self.decoder.prepare(raw);
        let backend = self.decoder.backend();
        let signals = self.signals.clone();

        tracing::debug!(bytes = prepared.len(), "decoding accumulated bytes");
        self.runtime.spawn_blocking(move || {
            let result = backend.decode(&prepared);
            let _ = signals.send(Signal::Decoded { receipt, result });
        });
    }

    fn on_decoded(&mut self, receipt: ChunkReceipt, result: PlayerResult<DecodedAudio>) {
        self.busy = false;
        let decoded = match result {
            Ok(decoded) => decoded,
            Err(e) => return self.fail(e),
        };

        tracing::debug!(
            frames = decoded.num_frames(),
            duration = decoded.duration,
            downloaded = receipt.downloaded,
            "decoded prefix"
        );
        self.events.emit(PlayerEvent::Decoded {
            decoded_duration: decoded.duration,
            downloaded: receipt.downloaded,
        });

        if let Some(estimate) =
            self.decoder
                .estimate_duration(&decoded, receipt.downloaded, receipt.total)
        {
            let buffer = self.store.ensure_allocated(
                decoded.channel_count(),
                estimate,
                decoded.sample_rate,
            );
            self.store.merge_decoded(&decoded);
            self.controller.bind(buffer, estimate);

            if self.ready_state < ReadyState::HaveEnoughData {
                self.ready_state = ReadyState::HaveEnoughData;
                self.events.emit(PlayerEvent::LoadedDuration(decoded.duration));
                self.events.emit(PlayerEvent::Load);
            }
        }

        if self.streaming && !receipt.is_complete() {
            let signals = self.signals.clone();
            let delay = self.continuation_delay;
            self.runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = signals.send(Signal::Continue);
            });
        }
    }

    fn fail(&mut self, err: PlayerError) {
        tracing::warn!("progressive playback error: {err}");
        self.busy = false;
        self.halted = true;
        self.events.emit(PlayerEvent::Error(err));
    }
}

/// Applies queued completions until the session is dropped.
async fn drive<T, B, D>(
    inner: Weak<Mutex<SessionInner<T, B, D>>>,
    mut signals: UnboundedReceiver<Signal>,
) where
    T: RangeTransport,
    B: RenderBackend,
    D: DecodeBackend,
{
    while let Some(signal) = signals.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.lock().handle(signal);
    }
    tracing::trace!("session driver stopped");
}
