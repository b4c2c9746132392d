//! Audio graph, built-in nodes, and engine integration.
//!
//! This crate provides the processing graph, the file/mixer/filter node
//! set, audio file loading, and cpal stream management. Construction and
//! topology validation happen on the control side; the render side only
//! ever applies pre-validated edits and polls atomic parameter slots.

pub mod engine;
pub mod file;
pub mod graph;
pub mod nodes;

pub use engine::AudioEngine;
pub use graph::{AudioGraph, Connection, NodeEntry};
pub use nodes::{AudioPlayer, BandRejectFilter, ConstructionError, Mixer, PlaybackState};

use nodus_core::{ChannelCount, Frames, SampleRate};

/// Audio configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub sample_rate: SampleRate,
    pub block_size: Frames,
    pub output_channels: ChannelCount,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 256,
            output_channels: 2,
        }
    }
}
