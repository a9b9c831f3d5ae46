//! Completions delivered back to the session's driver task.
//!
//! Network responses, decode results, continuation timers, frame ticks and
//! render-node endings all arrive here and are applied one at a time.

use tokio::sync::mpsc::UnboundedSender;

use crate::audio::DecodedAudio;
use crate::error::{PlayerError, PlayerResult};
use crate::fetch::{ChunkReceipt, RangeResponse};
use crate::playback::NodeId;

pub(crate) enum Signal {
    Fetched(PlayerResult<RangeResponse>),
    Decoded {
        receipt: ChunkReceipt,
        result: PlayerResult<DecodedAudio>,
    },
    Continue,
    Frame,
    NodeEnded(NodeId),
    Failed(PlayerError),
}

pub(crate) type SignalTx = UnboundedSender<Signal>;
