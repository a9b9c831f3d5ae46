use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::signal::{Signal, SignalTx};

/// Default period of position reports (~60 Hz).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Delivers one position-report tick to the controller.
#[derive(Clone)]
pub struct FrameTicker {
    tx: SignalTx,
}

impl FrameTicker {
    pub(crate) fn new(tx: SignalTx) -> Self {
        Self { tx }
    }

    /// Returns `false` once the session is gone.
    pub fn tick(&self) -> bool {
        self.tx.send(Signal::Frame).is_ok()
    }
}

/// Repeating frame callback, active only while playing.
pub trait FrameScheduler: Send + 'static {
    fn schedule(&mut self, ticker: FrameTicker);
    fn cancel(&mut self);
    fn is_scheduled(&self) -> bool;
}

/// Ticks on a tokio interval.
pub struct IntervalScheduler {
    period: Duration,
    runtime: Handle,
    task: Option<JoinHandle<()>>,
}

impl IntervalScheduler {
    pub fn new(period: Duration, runtime: Handle) -> Self {
        Self {
            period,
            runtime,
            task: None,
        }
    }
}

impl FrameScheduler for IntervalScheduler {
    fn schedule(&mut self, ticker: FrameTicker) {
        self.cancel();
        let period = self.period;
        self.task = Some(self.runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !ticker.tick() {
                    break;
                }
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn is_scheduled(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Scheduler driven by hand: [`ManualScheduler::fire`] delivers one tick if scheduled.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    scheduled: Arc<AtomicBool>,
    ticker: Arc<Mutex<Option<FrameTicker>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a tick was delivered.
    pub fn fire(&self) -> bool {
        if !self.scheduled.load(Ordering::SeqCst) {
            return false;
        }
        self.ticker.lock().as_ref().is_some_and(FrameTicker::tick)
    }
}

impl FrameScheduler for ManualScheduler {
    fn schedule(&mut self, ticker: FrameTicker) {
        *self.ticker.lock() = Some(ticker);
        self.scheduled.store(true, Ordering::SeqCst);
    }

    fn cancel(&mut self) {
        self.scheduled.store(false, Ordering::SeqCst);
        *self.ticker.lock() = None;
    }

    fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }
}
