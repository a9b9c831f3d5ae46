//! Render backend seam.
//!
//! The controller only needs a gain stage and one-shot source nodes that play
//! the shared [`PlayBuffer`](crate::PlayBuffer). [`crate::CpalBackend`] is the
//! device implementation; tests use a recording fake.

use std::fmt;

use crate::audio::{LoopRegion, SharedPlayBuffer};
use crate::signal::{Signal, SignalTx};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Lets a source node report that it played to the end on its own.
///
/// Firing after the controller detached the node is harmless; the
/// notification is ignored.
#[derive(Clone)]
pub struct EndedSignal {
    node: NodeId,
    tx: SignalTx,
}

impl EndedSignal {
    pub(crate) fn new(node: NodeId, tx: SignalTx) -> Self {
        Self { node, tx }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn fire(&self) {
        let _ = self.tx.send(Signal::NodeEnded(self.node));
    }
}

pub trait RenderBackend: Send + 'static {
    type Node: SourceNode;

    /// A fresh, unstarted source node connected to the gain stage.
    fn create_source(&self, ended: EndedSignal) -> Self::Node;

    fn gain(&self) -> f32;

    fn set_gain(&self, gain: f32);
}

/// One-shot buffer source. Once stopped it is discarded.
pub trait SourceNode: Send + 'static {
    fn id(&self) -> NodeId;

    /// Attach the play buffer. If the node is already playing, output of the
    /// buffer begins at `resume_at` seconds.
    fn set_buffer(&mut self, buffer: SharedPlayBuffer, resume_at: f64);

    fn set_loop(&mut self, region: LoopRegion);

    /// Begin rendering at `offset` seconds into the buffer.
    fn start(&mut self, offset: f64);

    fn stop(&mut self);

    /// Remove the node from the render graph.
    fn disconnect(&mut self);
}
