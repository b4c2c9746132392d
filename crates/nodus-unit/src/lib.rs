//! Processing-unit abstraction layer.
//!
//! This crate defines the common `AudioUnit` trait that every node in the
//! audio graph implements — built-in units (mixer, player) as well as
//! adapters over opaque native DSP kernels. It also owns the parameter
//! registry and the lock-free parameter dispatch slots shared between the
//! control domain and the render domain.

pub mod kernel;
pub mod param;

pub use kernel::{DspKernel, KernelUnit};
pub use param::{ParamAddress, ParamError, ParamTable, ParameterSpec, ParameterUnit, Ramp};

use std::sync::Arc;

use nodus_core::{ChannelCount, Frames, Sample, SampleRate};

/// Audio buffer for processing
pub struct AudioBuffer<'a, 'b> {
    pub inputs: &'a [&'b [Sample]],
    pub outputs: &'a mut [&'b mut [Sample]],
    pub frames: Frames,
}

/// A processing unit hosted by the audio graph.
///
/// Implementations run on the render thread once attached. `process` (and
/// `process_in_place`) must be real-time safe: no allocation, no locks, no
/// I/O. Anything the control domain wants to change at run time goes
/// through the unit's [`ParamTable`] or a dedicated atomic slot.
pub trait AudioUnit: Send {
    /// Initialize the unit with the graph's sample rate and max block size
    fn initialize(
        &mut self,
        sample_rate: SampleRate,
        max_block_size: Frames,
    ) -> Result<(), UnitError>;

    /// Process one block, reading `inputs` and writing `outputs`
    fn process(&mut self, audio: &mut AudioBuffer) -> Result<(), UnitError>;

    /// Whether input and output buffers may alias.
    ///
    /// When this returns `true` the graph skips allocating a distinct
    /// output buffer for the node and calls [`process_in_place`] instead
    /// of [`process`]. This is a contract, not a hint: a unit that reports
    /// `true` but reads an input sample after writing the same slot will
    /// corrupt audio.
    ///
    /// [`process_in_place`]: AudioUnit::process_in_place
    /// [`process`]: AudioUnit::process
    fn can_process_in_place(&self) -> bool {
        false
    }

    /// Process one block in place; `io` holds input samples on entry and
    /// must hold output samples on return.
    ///
    /// Only called when [`can_process_in_place`](Self::can_process_in_place)
    /// returns `true`.
    fn process_in_place(
        &mut self,
        _io: &mut [&mut [Sample]],
        _frames: Frames,
    ) -> Result<(), UnitError> {
        Err(UnitError::ProcessingFailed(
            "unit does not process in place".to_string(),
        ))
    }

    /// Get number of input channels
    fn input_channels(&self) -> ChannelCount;

    /// Get number of output channels
    fn output_channels(&self) -> ChannelCount;

    /// The unit's parameter table, if it declares any parameters
    fn params(&self) -> Option<&Arc<ParamTable>> {
        None
    }

    /// Deactivate and cleanup
    fn deactivate(&mut self) {}
}

/// Unit-related errors.
///
/// Render-path failures are treated as programming defects: units are
/// validated at construction, so a `ProcessingFailed` after attach means a
/// caller violated the buffer-shape contract, not a runtime condition to
/// recover from.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UnitError {
    #[error("unit initialization failed: {0}")]
    InitializationFailed(String),

    #[error("unit processing failed: {0}")]
    ProcessingFailed(String),
}
