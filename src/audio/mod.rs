pub mod decoder;
pub mod engine;
pub mod store;
pub mod types;

pub use decoder::{
    decode_bytes, extrapolate_duration, DecodeBackend, IncrementalDecoder, PreDecode, PreDecodeFn,
    SymphoniaDecoder,
};
pub use engine::CpalBackend;
pub use store::SampleBufferStore;
pub use types::{
    DecodedAudio, LoopRegion, PlayBuffer, PlaybackState, ReadyState, SharedPlayBuffer,
};
