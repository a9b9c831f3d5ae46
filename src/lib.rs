//! Progressive playback of remote audio.
//!
//! A remote file is fetched in fixed-size byte ranges; after every range the
//! whole downloaded prefix is decoded and copied into one play buffer, so
//! playback can begin long before the download completes. Position is derived
//! from wall-clock time and the total duration is extrapolated from the first
//! decoded prefix.
//!
//! This file only wires modules and re-exports.

pub mod audio;
mod error;
mod events;
pub mod fetch;
mod options;
pub mod playback;
mod session;
mod signal;
pub mod source;

pub use crate::audio::{
    CpalBackend, DecodeBackend, DecodedAudio, IncrementalDecoder, LoopRegion, PlayBuffer,
    PlaybackState, PreDecode, ReadyState, SampleBufferStore, SharedPlayBuffer, SymphoniaDecoder,
};
pub use crate::error::{PlayerError, PlayerResult};
pub use crate::events::{EventSink, PlayerEvent};
pub use crate::fetch::{
    ByteRange, ChunkReceipt, ChunkedFetcher, HttpTransport, ProgressSink, RangeResponse,
    RangeTransport,
};
pub use crate::options::PlayerOptions;
pub use crate::playback::{
    Clock, EndedSignal, FrameScheduler, ManualClock, ManualScheduler, NodeId, PlaybackController,
    RenderBackend, SourceNode, TokioClock,
};
pub use crate::session::{ProgressivePlaybackSession, SessionBuilder};
pub use crate::source::SourceCandidate;
