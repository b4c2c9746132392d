//! Built-in node types.
//!
//! Each node comes in two halves: a control-side handle (the public struct,
//! cheap to keep around, all methods callable from any non-render thread)
//! and a render-side unit that lives inside the graph. Everything fallible
//! happens at construction; after a node is attached, control calls only
//! touch atomic slots.

pub mod filter;
pub mod mixer;
pub mod player;

pub use filter::BandRejectFilter;
pub use mixer::Mixer;
pub use player::{AudioPlayer, PlaybackState};

use std::path::PathBuf;

use nodus_core::{ChannelCount, GraphError};
use nodus_unit::{ParamError, UnitError};

/// Errors raised while building a node, before it reaches the graph.
///
/// Construction is the fallible phase by design: once a node is attached,
/// its control methods cannot fail.
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    /// An audio file could not be opened or decoded
    #[error("cannot read {path}: {source}")]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// The source file has a channel layout the player cannot handle
    #[error("unsupported channel layout ({0} channels)")]
    UnsupportedLayout(ChannelCount),

    /// The unit refused the graph's configuration
    #[error(transparent)]
    InvalidConfig(#[from] UnitError),

    /// The node's parameter declaration was inconsistent
    #[error(transparent)]
    Param(#[from] ParamError),

    /// A requested initial connection was rejected
    #[error(transparent)]
    Graph(#[from] GraphError),
}
