pub mod backend;
pub mod clock;
pub mod controller;
pub mod scheduler;

pub use backend::{EndedSignal, NodeId, RenderBackend, SourceNode};
pub use clock::{Clock, ManualClock, TokioClock};
pub use controller::PlaybackController;
pub use scheduler::{
    FrameScheduler, FrameTicker, IntervalScheduler, ManualScheduler, DEFAULT_FRAME_INTERVAL,
};
