//! Core types, identifiers, and constants shared across the nodus ecosystem.
//!
//! This crate provides fundamental building blocks that all other nodus crates depend on.

use std::sync::atomic::{AtomicU64, Ordering};

/// Sample rate in Hz
pub type SampleRate = u32;

/// Number of audio frames (samples per channel)
pub type Frames = usize;

/// Audio sample type (32-bit float is standard for unit hosting)
pub type Sample = f32;

/// Number of audio channels
pub type ChannelCount = usize;

/// Common sample rates
pub mod sample_rates {
    use super::SampleRate;

    /// 44.1 kHz sample rate (CD quality)
    pub const SR_44100: SampleRate = 44100;
    /// 48 kHz sample rate (professional audio standard)
    pub const SR_48000: SampleRate = 48000;
    /// 96 kHz sample rate (high resolution audio)
    pub const SR_96000: SampleRate = 96000;
}

/// Audio buffer block sizes
pub mod block_sizes {
    use super::Frames;

    /// 64 frames per block (very low latency, ~1.3ms @ 48kHz)
    pub const BLOCK_64: Frames = 64;
    /// 128 frames per block (low latency, ~2.7ms @ 48kHz)
    pub const BLOCK_128: Frames = 128;
    /// 256 frames per block (balanced, ~5.3ms @ 48kHz)
    pub const BLOCK_256: Frames = 256;
    /// 512 frames per block (higher latency, ~10.7ms @ 48kHz)
    pub const BLOCK_512: Frames = 512;
}

/// Globally unique identifier for a node in the audio graph.
///
/// Ids are allocated once at node construction and stay stable for the
/// node's lifetime, which is what makes re-attaching a node to the graph
/// a safe no-op (the graph keys its node table on this id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate the next unique node id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for logging and diagnostics.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stream format carried by a graph edge: sample rate plus channel layout.
///
/// Both ends of a connection must agree with the edge format, and the
/// format must match the graph's sample rate; there is no implicit
/// conversion in the routing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: SampleRate,
    /// Number of channels
    pub channels: ChannelCount,
}

impl AudioFormat {
    /// Create a format with an explicit channel count.
    #[must_use]
    pub fn new(sample_rate: SampleRate, channels: ChannelCount) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Single-channel format.
    #[must_use]
    pub fn mono(sample_rate: SampleRate) -> Self {
        Self::new(sample_rate, 1)
    }

    /// Two-channel format.
    #[must_use]
    pub fn stereo(sample_rate: SampleRate) -> Self {
        Self::new(sample_rate, 2)
    }
}

/// Errors from graph topology edits.
///
/// All of these are recoverable: a failed edit leaves the graph exactly as
/// it was (all-or-nothing). The variants are `Copy` so they can be reported
/// from the render thread without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Referenced node is not registered in the graph's node table
    #[error("node {0} is not attached to the graph")]
    NotAttached(NodeId),

    /// The edge would make a node's output feed back into its own
    /// transitive input set
    #[error("connection would create a cycle")]
    CycleDetected,

    /// Edge format does not match both endpoints and the graph's sample
    /// rate, and no conversion is available
    #[error("edge format does not match both endpoints")]
    FormatMismatch,

    /// Node still has incident edges and cannot be detached
    #[error("node {0} still has incident connections")]
    NodeStillConnected(NodeId),
}
