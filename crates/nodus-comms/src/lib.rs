//! Lockless communication primitives for audio-thread-safe communication.
//!
//! Graph topology edits and transport commands travel from the control
//! domain to the render domain over a lock-free ring; events flow back the
//! same way. Node payloads (boxed units, which are not `Clone`) ride a
//! separate crossbeam channel whose `try_recv` is non-blocking on the
//! render side. Parameter values do NOT travel here — they go through the
//! per-node atomic slots in `nodus-unit`.

pub use rtrb;

use crossbeam_channel::{Receiver, Sender};

use nodus_core::{AudioFormat, GraphError, NodeId, Sample};
use nodus_unit::AudioUnit;

/// Commands sent from the control domain to the render domain.
///
/// IMPORTANT: every variant must be real-time safe to apply (no heap
/// allocation/deallocation on receipt). `Attach` carries no payload; the
/// unit itself arrives on the separate attach channel.
#[derive(Debug, Clone, Copy)]
pub enum GraphCommand {
    /// Start rendering
    Start,
    /// Stop rendering (output silence)
    Stop,
    /// Pull the next pending [`AttachRequest`] into the graph
    Attach,
    /// Detach a node from the graph
    Detach(NodeId),
    /// Connect two nodes with an edge format
    Connect {
        /// Source node id
        from: NodeId,
        /// Destination node id
        to: NodeId,
        /// Stream format the edge carries
        format: AudioFormat,
    },
    /// Disconnect two nodes
    Disconnect {
        /// Source node id
        from: NodeId,
        /// Destination node id
        to: NodeId,
    },
}

/// Events sent from the render domain back to the control domain
#[derive(Debug, Clone, Copy)]
pub enum EngineEvent {
    /// Rendering started
    Started,
    /// Rendering stopped
    Stopped,
    /// A topology edit was rejected; the graph is unchanged
    Rejected(GraphError),
    /// Peak level update (for meters, visualization)
    PeakLevel {
        /// Channel number
        channel: usize,
        /// Peak level value
        level: Sample,
    },
}

/// A node prepared on the control domain, waiting to be attached by the
/// render domain. Construction (file loading, kernel creation, parameter
/// declaration) happened strictly before this was sent.
pub struct AttachRequest {
    /// Pre-allocated node id, so the control side can wire connections
    /// before the attach lands
    pub id: NodeId,
    /// The render-side unit
    pub unit: Box<dyn AudioUnit>,
    /// The node's output format
    pub format: AudioFormat,
}

/// Command sender (control thread)
pub type CommandSender = rtrb::Producer<GraphCommand>;
/// Command receiver (render thread)
pub type CommandReceiver = rtrb::Consumer<GraphCommand>;

/// Event sender (render thread)
pub type EventSender = rtrb::Producer<EngineEvent>;
/// Event receiver (control thread)
pub type EventReceiver = rtrb::Consumer<EngineEvent>;

/// Create a pair of channels for bidirectional communication
pub fn create_channels(capacity: usize) -> (ControlChannels, RenderChannels) {
    let (command_tx, command_rx) = rtrb::RingBuffer::new(capacity);
    let (event_tx, event_rx) = rtrb::RingBuffer::new(capacity);
    let (attach_tx, attach_rx) = crossbeam_channel::unbounded();

    let control = ControlChannels {
        command_tx,
        event_rx,
        attach_tx,
    };

    let render = RenderChannels {
        command_rx,
        event_tx,
        attach_rx,
    };

    (control, render)
}

/// Channels held by the control domain (sends commands, receives events)
pub struct ControlChannels {
    /// Command sender (control -> render)
    pub command_tx: CommandSender,
    /// Event receiver (render -> control)
    pub event_rx: EventReceiver,
    /// Attach payload sender — separate channel for non-`Clone` units
    pub attach_tx: Sender<AttachRequest>,
}

/// Channels held by the render domain (receives commands, sends events)
pub struct RenderChannels {
    /// Command receiver (control -> render)
    pub command_rx: CommandReceiver,
    /// Event sender (render -> control)
    pub event_tx: EventSender,
    /// Attach payload receiver — `try_recv` is non-blocking
    pub attach_rx: Receiver<AttachRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_creation() {
        let (mut control, _render) = create_channels(256);
        assert!(control.command_tx.push(GraphCommand::Start).is_ok());
    }

    #[test]
    fn commands_round_trip_in_order() {
        let (mut control, mut render) = create_channels(8);
        let a = NodeId::next();
        let b = NodeId::next();
        control
            .command_tx
            .push(GraphCommand::Connect {
                from: a,
                to: b,
                format: AudioFormat::stereo(48000),
            })
            .unwrap();
        control.command_tx.push(GraphCommand::Stop).unwrap();

        assert!(matches!(
            render.command_rx.pop(),
            Ok(GraphCommand::Connect { .. })
        ));
        assert!(matches!(render.command_rx.pop(), Ok(GraphCommand::Stop)));
        assert!(render.command_rx.pop().is_err());
    }
}
