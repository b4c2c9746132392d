//! Stereo summing mixer node.
//!
//! Any number of sources connect in; the unit relies on the graph's
//! additive fan-in to do the summing, then applies a single master volume.
//! Volume is ramp-capable, so `set_volume` glides over the configured ramp
//! duration instead of stepping.

use std::sync::Arc;

use nodus_core::{AudioFormat, ChannelCount, Frames, NodeId, Sample, SampleRate};
use nodus_unit::{
    AudioBuffer, AudioUnit, ParamAddress, ParamTable, ParameterSpec, ParameterUnit, Ramp,
    UnitError,
};

use crate::graph::{AudioGraph, NodeEntry};
use crate::nodes::ConstructionError;

/// Address of the master volume parameter
pub const VOLUME_ADDRESS: ParamAddress = 0;

const MIN_VOLUME: f32 = 0.0;
const MAX_VOLUME: f32 = 2.0;
const DEFAULT_VOLUME: f32 = 1.0;

/// Control-side handle to a mixer node
#[derive(Debug)]
pub struct Mixer {
    id: NodeId,
    params: Arc<ParamTable>,
    format: AudioFormat,
}

impl Mixer {
    /// Build a mixer, attach it, and connect every node in `inputs` to it.
    ///
    /// Construction is all-or-nothing: if any initial connection is
    /// rejected the error surfaces here, before the handle exists.
    pub fn new(
        graph: &mut AudioGraph,
        inputs: impl IntoIterator<Item = NodeId>,
    ) -> Result<Self, ConstructionError> {
        let table = ParamTable::new(vec![ParameterSpec {
            identifier: "volume".to_string(),
            address: VOLUME_ADDRESS,
            name: "Volume".to_string(),
            unit: ParameterUnit::LinearGain,
            min: MIN_VOLUME,
            max: MAX_VOLUME,
            ramp_capable: true,
            default: DEFAULT_VOLUME,
        }])?;

        let unit = MixerUnit::new(table);
        let params = unit.param_handle();
        let format = AudioFormat::stereo(graph.sample_rate());

        let id = graph
            .attach(NodeEntry::new(Box::new(unit), format))
            .map_err(ConstructionError::InvalidConfig)?;

        let mixer = Self { id, params, format };
        for input in inputs {
            mixer.connect_input(graph, input)?;
        }
        Ok(mixer)
    }

    /// Connect another source to the mixer
    pub fn connect_input(
        &self,
        graph: &mut AudioGraph,
        source: NodeId,
    ) -> Result<(), ConstructionError> {
        graph.connect(source, self.id, self.format)?;
        Ok(())
    }

    /// The mixer's node id, for wiring it into the graph
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    /// Set the master volume. Out-of-range values are clamped to `[0, 2]`.
    pub fn set_volume(&self, volume: f32) {
        // The address is declared above; the write cannot fail
        let _ = self.params.write(VOLUME_ADDRESS, volume, true);
    }

    /// Current volume target
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.params.target(VOLUME_ADDRESS).unwrap_or(DEFAULT_VOLUME)
    }

    /// Configure how long ramped volume changes take
    pub fn set_ramp_duration(&self, seconds: f32) {
        self.params.set_ramp_duration(seconds);
    }
}

/// Render-side mixer unit. The graph sums all connected sources into the
/// input buffer; this unit only applies the volume ramp.
struct MixerUnit {
    params: Arc<ParamTable>,
    volume: Ramp,
    volume_generation: u16,
    sample_rate: SampleRate,
}

impl MixerUnit {
    fn new(params: ParamTable) -> Self {
        Self {
            params: Arc::new(params),
            volume: Ramp::new(DEFAULT_VOLUME),
            volume_generation: 0,
            sample_rate: 48000,
        }
    }

    fn param_handle(&self) -> Arc<ParamTable> {
        Arc::clone(&self.params)
    }

    fn refresh_volume(&mut self) {
        if let Some((value, ramped)) = self.params.poll(VOLUME_ADDRESS, &mut self.volume_generation)
        {
            let frames = self.params.ramp_frames(self.sample_rate);
            self.volume.retarget(value, ramped, frames);
        }
    }
}

impl AudioUnit for MixerUnit {
    fn initialize(&mut self, sample_rate: SampleRate, _: Frames) -> Result<(), UnitError> {
        self.sample_rate = sample_rate;
        Ok(())
    }

    fn process(&mut self, audio: &mut AudioBuffer) -> Result<(), UnitError> {
        self.refresh_volume();
        for frame in 0..audio.frames {
            let gain = self.volume.advance();
            for (input, output) in audio.inputs.iter().zip(audio.outputs.iter_mut()) {
                output[frame] = input[frame] * gain;
            }
        }
        Ok(())
    }

    fn can_process_in_place(&self) -> bool {
        true
    }

    fn process_in_place(
        &mut self,
        io: &mut [&mut [Sample]],
        frames: Frames,
    ) -> Result<(), UnitError> {
        self.refresh_volume();
        for frame in 0..frames {
            let gain = self.volume.advance();
            for channel in io.iter_mut() {
                channel[frame] *= gain;
            }
        }
        Ok(())
    }

    fn input_channels(&self) -> ChannelCount {
        2
    }

    fn output_channels(&self) -> ChannelCount {
        2
    }

    fn params(&self) -> Option<&Arc<ParamTable>> {
        Some(&self.params)
    }
}
