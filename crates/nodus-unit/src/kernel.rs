//! Opaque DSP kernel boundary.
//!
//! Effect nodes delegate their signal processing to a native kernel the
//! graph layer treats as a black box: deterministic output for identical
//! input and parameter history, real-time-bounded `process` cost, no error
//! path once constructed. The kernel is created by a factory taking a
//! channel count and sample rate, and is driven through a narrow typed
//! interface — the raw handle is never exposed.

use std::sync::Arc;

use nodus_core::{ChannelCount, Frames, Sample, SampleRate};

use crate::param::{ParamAddress, ParamTable};
use crate::{AudioBuffer, AudioUnit, UnitError};

/// Narrow interface over a native DSP kernel.
///
/// `set_parameter` applies a value with the kernel's internal ramping;
/// `set_parameter_immediately` bypasses the ramp. Both must be cheap enough
/// to call from the render thread. `process` filters the block in place.
pub trait DspKernel: Send {
    /// Apply a parameter value, ramped by the kernel
    fn set_parameter(&mut self, address: ParamAddress, value: f32);

    /// Apply a parameter value with no ramp
    fn set_parameter_immediately(&mut self, address: ParamAddress, value: f32);

    /// Filter one block in place
    fn process(&mut self, io: &mut [&mut [Sample]], frames: Frames);
}

/// Adapts a [`DspKernel`] plus its [`ParamTable`] to the [`AudioUnit`]
/// contract.
///
/// At the top of every block the adapter drains freshly written parameter
/// slots and forwards each to the kernel — ramped writes through
/// [`DspKernel::set_parameter`], immediate writes through
/// [`DspKernel::set_parameter_immediately`]. Defaults are pushed once at
/// construction so the kernel never runs with undefined parameter state.
pub struct KernelUnit {
    kernel: Box<dyn DspKernel>,
    params: Arc<ParamTable>,
    /// Per-parameter write generations, indexed by declaration order
    generations: Vec<u16>,
    channels: ChannelCount,
}

impl KernelUnit {
    /// Wrap a freshly created kernel. `channels` is the channel count the
    /// kernel factory was sized for.
    pub fn new(mut kernel: Box<dyn DspKernel>, params: ParamTable, channels: ChannelCount) -> Self {
        for spec in params.specs() {
            kernel.set_parameter_immediately(spec.address, spec.default);
        }
        let generations = vec![0; params.len()];
        Self {
            kernel,
            params: Arc::new(params),
            generations,
            channels,
        }
    }

    /// Handle for the control domain to dispatch parameter writes through
    pub fn param_handle(&self) -> Arc<ParamTable> {
        Arc::clone(&self.params)
    }

    fn drain_params(&mut self) {
        for (index, generation) in self.generations.iter_mut().enumerate() {
            if let Some((address, value, ramped)) = self.params.poll_index(index, generation) {
                if ramped {
                    self.kernel.set_parameter(address, value);
                } else {
                    self.kernel.set_parameter_immediately(address, value);
                }
            }
        }
    }
}

impl AudioUnit for KernelUnit {
    fn initialize(&mut self, _sample_rate: SampleRate, _max_block_size: Frames) -> Result<(), UnitError> {
        // Kernels are sized for a sample rate at creation; nothing to do here.
        Ok(())
    }

    fn process(&mut self, audio: &mut AudioBuffer) -> Result<(), UnitError> {
        if audio.inputs.len() != self.channels || audio.outputs.len() != self.channels {
            return Err(UnitError::ProcessingFailed(format!(
                "kernel unit sized for {} channels, got {} in / {} out",
                self.channels,
                audio.inputs.len(),
                audio.outputs.len()
            )));
        }

        self.drain_params();

        // Kernels filter in place; copy input through first.
        for (output, input) in audio.outputs.iter_mut().zip(audio.inputs.iter()) {
            output[..audio.frames].copy_from_slice(&input[..audio.frames]);
        }
        self.kernel.process(audio.outputs, audio.frames);
        Ok(())
    }

    fn can_process_in_place(&self) -> bool {
        true
    }

    fn process_in_place(&mut self, io: &mut [&mut [Sample]], frames: Frames) -> Result<(), UnitError> {
        if io.len() != self.channels {
            return Err(UnitError::ProcessingFailed(format!(
                "kernel unit sized for {} channels, got {}",
                self.channels,
                io.len()
            )));
        }
        self.drain_params();
        self.kernel.process(io, frames);
        Ok(())
    }

    fn input_channels(&self) -> ChannelCount {
        self.channels
    }

    fn output_channels(&self) -> ChannelCount {
        self.channels
    }

    fn params(&self) -> Option<&Arc<ParamTable>> {
        Some(&self.params)
    }
}
