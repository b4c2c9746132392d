//! Band-reject (notch) Butterworth filter node.
//!
//! The DSP itself lives in an opaque [`DspKernel`] supplied by the caller
//! through a factory closure; this module declares the parameter tree,
//! wraps the kernel in a [`KernelUnit`], and exposes typed setters. Each
//! setter comes in a ramped and an immediate flavor, mirroring the two
//! kernel entry points.

use std::sync::Arc;

use nodus_core::{AudioFormat, ChannelCount, NodeId, SampleRate};
use nodus_unit::{
    DspKernel, KernelUnit, ParamAddress, ParamTable, ParameterSpec, ParameterUnit,
};

use crate::graph::{AudioGraph, NodeEntry};
use crate::nodes::ConstructionError;

/// Address of the center frequency parameter
pub const CENTER_FREQUENCY_ADDRESS: ParamAddress = 0;
/// Address of the bandwidth parameter
pub const BANDWIDTH_ADDRESS: ParamAddress = 1;

const DEFAULT_CENTER_FREQUENCY: f32 = 3_000.0;
const DEFAULT_BANDWIDTH: f32 = 2_000.0;

/// Control-side handle to a band-reject filter node
pub struct BandRejectFilter {
    id: NodeId,
    params: Arc<ParamTable>,
}

impl BandRejectFilter {
    /// Build a filter around a kernel produced by `make_kernel` (called
    /// with the channel count and the graph's sample rate) and attach it.
    pub fn new<F>(
        graph: &mut AudioGraph,
        channels: ChannelCount,
        make_kernel: F,
    ) -> Result<Self, ConstructionError>
    where
        F: FnOnce(ChannelCount, SampleRate) -> Box<dyn DspKernel>,
    {
        let table = ParamTable::new(vec![
            ParameterSpec {
                identifier: "centerFrequency".to_string(),
                address: CENTER_FREQUENCY_ADDRESS,
                name: "Center Frequency (Hz)".to_string(),
                unit: ParameterUnit::Hertz,
                min: 12.0,
                max: 20_000.0,
                ramp_capable: true,
                default: DEFAULT_CENTER_FREQUENCY,
            },
            ParameterSpec {
                identifier: "bandwidth".to_string(),
                address: BANDWIDTH_ADDRESS,
                name: "Bandwidth (Hz)".to_string(),
                unit: ParameterUnit::Hertz,
                min: 0.0,
                max: 20_000.0,
                ramp_capable: true,
                default: DEFAULT_BANDWIDTH,
            },
        ])?;

        let kernel = make_kernel(channels, graph.sample_rate());
        let unit = KernelUnit::new(kernel, table, channels);
        let params = unit.param_handle();
        let format = AudioFormat::new(graph.sample_rate(), channels);

        let id = graph
            .attach(NodeEntry::new(Box::new(unit), format))
            .map_err(ConstructionError::InvalidConfig)?;

        Ok(Self { id, params })
    }

    /// The filter's node id, for wiring it into the graph
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    /// Set the notch center, ramped; clamped to `[12, 20000]` Hz
    pub fn set_center_frequency(&self, hz: f32) {
        let _ = self.params.write(CENTER_FREQUENCY_ADDRESS, hz, true);
    }

    /// Set the notch center with no ramp
    pub fn set_center_frequency_immediately(&self, hz: f32) {
        let _ = self.params.write(CENTER_FREQUENCY_ADDRESS, hz, false);
    }

    /// Current center frequency target
    #[must_use]
    pub fn center_frequency(&self) -> f32 {
        self.params
            .target(CENTER_FREQUENCY_ADDRESS)
            .unwrap_or(DEFAULT_CENTER_FREQUENCY)
    }

    /// Set the notch width, ramped; clamped to `[0, 20000]` Hz
    pub fn set_bandwidth(&self, hz: f32) {
        let _ = self.params.write(BANDWIDTH_ADDRESS, hz, true);
    }

    /// Set the notch width with no ramp
    pub fn set_bandwidth_immediately(&self, hz: f32) {
        let _ = self.params.write(BANDWIDTH_ADDRESS, hz, false);
    }

    /// Current bandwidth target
    #[must_use]
    pub fn bandwidth(&self) -> f32 {
        self.params
            .target(BANDWIDTH_ADDRESS)
            .unwrap_or(DEFAULT_BANDWIDTH)
    }

    /// Configure how long ramped parameter changes take
    pub fn set_ramp_duration(&self, seconds: f32) {
        self.params.set_ramp_duration(seconds);
    }

    /// Current ramp duration in seconds
    #[must_use]
    pub fn ramp_duration(&self) -> f32 {
        self.params.ramp_duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use nodus_core::{Frames, GraphError, Sample};
    use nodus_unit::{AudioBuffer, AudioUnit, UnitError};

    type CallLog = Arc<Mutex<Vec<(ParamAddress, f32, bool)>>>;

    struct ProbeKernel {
        calls: CallLog,
    }

    impl DspKernel for ProbeKernel {
        fn set_parameter(&mut self, address: ParamAddress, value: f32) {
            self.calls.lock().unwrap().push((address, value, true));
        }

        fn set_parameter_immediately(&mut self, address: ParamAddress, value: f32) {
            self.calls.lock().unwrap().push((address, value, false));
        }

        fn process(&mut self, _: &mut [&mut [Sample]], _: Frames) {}
    }

    fn probe_filter(
        graph: &mut AudioGraph,
        channels: ChannelCount,
    ) -> (BandRejectFilter, CallLog) {
        let calls = CallLog::default();
        let log = Arc::clone(&calls);
        let filter = BandRejectFilter::new(graph, channels, move |_, _| {
            Box::new(ProbeKernel { calls: log })
        })
        .unwrap();
        (filter, calls)
    }

    #[test]
    fn defaults_match_the_declared_tree() {
        let mut graph = AudioGraph::with_config(44100, 64);
        let (filter, calls) = probe_filter(&mut graph, 2);

        assert_eq!(filter.center_frequency(), 3_000.0);
        assert_eq!(filter.bandwidth(), 2_000.0);
        // Both defaults were pushed into the kernel at construction
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &[(0, 3_000.0, false), (1, 2_000.0, false)]
        );
    }

    #[test]
    fn setters_clamp_to_the_declared_ranges() {
        let mut graph = AudioGraph::with_config(44100, 64);
        let (filter, _) = probe_filter(&mut graph, 2);

        filter.set_center_frequency(5.0);
        assert_eq!(filter.center_frequency(), 12.0);
        filter.set_center_frequency(99_999.0);
        assert_eq!(filter.center_frequency(), 20_000.0);

        filter.set_bandwidth_immediately(-100.0);
        assert_eq!(filter.bandwidth(), 0.0);
    }

    #[test]
    fn ramped_and_immediate_setters_reach_the_right_kernel_entry() {
        let mut graph = AudioGraph::with_config(44100, 64);
        let (filter, calls) = probe_filter(&mut graph, 1);

        filter.set_center_frequency(440.0);
        render_once(&mut graph, 1);
        filter.set_bandwidth_immediately(500.0);
        render_once(&mut graph, 1);

        let calls = calls.lock().unwrap();
        // After the two construction defaults
        assert_eq!(&calls[2..], &[(0, 440.0, true), (1, 500.0, false)]);
    }

    #[test]
    fn mono_filter_refuses_a_stereo_edge() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let (filter, _) = probe_filter(&mut graph, 1);

        let stereo = graph
            .attach(NodeEntry::new(
                Box::new(StereoSource),
                AudioFormat::stereo(48000),
            ))
            .unwrap();

        assert_eq!(
            graph.connect(stereo, filter.node_id(), AudioFormat::stereo(48000)),
            Err(GraphError::FormatMismatch)
        );
    }

    struct StereoSource;

    impl AudioUnit for StereoSource {
        fn initialize(&mut self, _: SampleRate, _: Frames) -> Result<(), UnitError> {
            Ok(())
        }

        fn process(&mut self, audio: &mut AudioBuffer) -> Result<(), UnitError> {
            for ch in audio.outputs.iter_mut() {
                ch[..audio.frames].fill(0.0);
            }
            Ok(())
        }

        fn input_channels(&self) -> ChannelCount {
            0
        }

        fn output_channels(&self) -> ChannelCount {
            2
        }
    }

    fn render_once(graph: &mut AudioGraph, channels: usize) {
        let mut output = vec![vec![0.0_f32; 64]; channels];
        let mut refs: Vec<&mut [Sample]> = output.iter_mut().map(Vec::as_mut_slice).collect();
        graph.process(&mut refs);
    }
}
