//! Audio processing graph.
//!
//! Nodes are [`AudioUnit`]s attached under control-side-allocated ids;
//! directed edges carry a declared [`AudioFormat`]. Topology edits are
//! validated up front — an edit that would leave the graph inconsistent
//! (dangling endpoint, format mismatch, cycle) is rejected whole and the
//! graph is left exactly as it was. Processing walks the nodes in
//! topological order and mixes fan-in additively.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use smallvec::SmallVec;

use nodus_comms::AttachRequest;
use nodus_core::{AudioFormat, Frames, GraphError, NodeId, Sample, SampleRate};
use nodus_unit::{AudioBuffer, AudioUnit, UnitError};

/// A unit prepared for attachment.
///
/// The id is allocated here, on the control side, so callers can hold it
/// (and wire connections against it) before the attach lands on the render
/// thread. Attaching the same entry twice is a no-op, which makes attach
/// delivery safe to retry.
pub struct NodeEntry {
    id: NodeId,
    unit: Box<dyn AudioUnit>,
    format: AudioFormat,
}

impl NodeEntry {
    /// Wrap a unit under a freshly allocated id
    pub fn new(unit: Box<dyn AudioUnit>, format: AudioFormat) -> Self {
        Self {
            id: NodeId::next(),
            unit,
            format,
        }
    }

    /// Wrap a unit under an id allocated earlier (attach-over-channel path)
    pub fn with_id(id: NodeId, unit: Box<dyn AudioUnit>, format: AudioFormat) -> Self {
        Self { id, unit, format }
    }

    /// The id this entry will attach under
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl From<AttachRequest> for NodeEntry {
    fn from(request: AttachRequest) -> Self {
        Self {
            id: request.id,
            unit: request.unit,
            format: request.format,
        }
    }
}

/// Directed edge between two nodes, carrying the stream format agreed at
/// connect time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    pub from: NodeId,
    pub to: NodeId,
    pub format: AudioFormat,
}

/// A node plus its routing buffers.
///
/// In-place nodes render directly into their input buffer and have no
/// output buffer at all; everything downstream reads whichever buffer
/// `rendered()` points at.
struct GraphNode {
    unit: Box<dyn AudioUnit>,
    format: AudioFormat,
    in_place: bool,
    input: Vec<Vec<Sample>>,
    output: Vec<Vec<Sample>>,
}

impl GraphNode {
    fn rendered(&self) -> &[Vec<Sample>] {
        if self.in_place { &self.input } else { &self.output }
    }
}

/// The audio processing graph
pub struct AudioGraph {
    nodes: HashMap<NodeId, GraphNode>,
    connections: HashSet<Connection>,

    sample_rate: SampleRate,
    block_size: Frames,

    // Caches rebuilt on every topology change so process() never allocates:
    // topological processing order, per-node fan-in, and the sink set.
    order: Vec<NodeId>,
    incoming: HashMap<NodeId, Vec<NodeId>>,
    sinks: Vec<NodeId>,
}

impl AudioGraph {
    /// Create a new empty audio graph
    pub fn new() -> Self {
        Self::with_config(48000, 512)
    }

    /// Create a new audio graph with specific sample rate and block size
    pub fn with_config(sample_rate: SampleRate, block_size: Frames) -> Self {
        Self {
            nodes: HashMap::new(),
            connections: HashSet::new(),
            sample_rate,
            block_size,
            order: Vec::new(),
            incoming: HashMap::new(),
            sinks: Vec::new(),
        }
    }

    /// The graph's sample rate
    #[must_use]
    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// The graph's block size
    #[must_use]
    pub fn block_size(&self) -> Frames {
        self.block_size
    }

    /// Number of attached nodes
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether a node is currently attached
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The declared format of an attached node
    #[must_use]
    pub fn node_format(&self, id: NodeId) -> Option<AudioFormat> {
        self.nodes.get(&id).map(|n| n.format)
    }

    /// Number of edges
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether an edge exists between two nodes
    #[must_use]
    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.connections
            .iter()
            .any(|c| c.from == from && c.to == to)
    }

    /// Initialize or update the graph configuration
    pub fn set_config(&mut self, sample_rate: SampleRate, block_size: Frames) {
        self.sample_rate = sample_rate;
        self.block_size = block_size;

        for (id, node) in &mut self.nodes {
            if let Err(e) = node.unit.initialize(sample_rate, block_size) {
                tracing::error!("Failed to reinitialize unit {id}: {e}");
            }
        }

        self.allocate_buffers();
    }

    /// Attach a node to the graph.
    ///
    /// Initializes the unit with the graph's sample rate and block size and
    /// allocates its routing buffers. Attaching an id that is already
    /// present leaves the existing node untouched and returns the id.
    pub fn attach(&mut self, entry: NodeEntry) -> Result<NodeId, UnitError> {
        let NodeEntry {
            id,
            mut unit,
            format,
        } = entry;

        if self.nodes.contains_key(&id) {
            tracing::debug!("Node {id} already attached, ignoring");
            return Ok(id);
        }

        unit.initialize(self.sample_rate, self.block_size)?;

        let inputs = unit.input_channels();
        let outputs = unit.output_channels();
        // In-place rendering needs matching channel shape on both sides
        let in_place = unit.can_process_in_place() && inputs == outputs && inputs > 0;

        let input = vec![vec![0.0; self.block_size]; inputs];
        let output = if in_place {
            Vec::new()
        } else {
            vec![vec![0.0; self.block_size]; outputs]
        };

        self.nodes.insert(
            id,
            GraphNode {
                unit,
                format,
                in_place,
                input,
                output,
            },
        );

        // Allocates, but runs on topology edits, never in process()
        self.update_topology();

        tracing::debug!("Attached node {id} ({inputs} inputs, {outputs} outputs, in_place={in_place})");
        Ok(id)
    }

    /// Detach a node from the graph.
    ///
    /// Refused while any edge still touches the node; disconnect first.
    pub fn detach(&mut self, id: NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&id) {
            return Err(GraphError::NotAttached(id));
        }
        if self
            .connections
            .iter()
            .any(|c| c.from == id || c.to == id)
        {
            return Err(GraphError::NodeStillConnected(id));
        }

        if let Some(mut node) = self.nodes.remove(&id) {
            node.unit.deactivate();
        }
        self.update_topology();

        tracing::debug!("Detached node {id}");
        Ok(())
    }

    /// Connect two nodes.
    ///
    /// The edge format must agree with both endpoints: its channel count
    /// with the source's outputs and the destination's inputs, its sample
    /// rate with the graph's. An edge that would close a cycle (including a
    /// self-loop) is rejected before insertion, so the graph stays acyclic
    /// at all times. Connecting an existing edge again is a no-op.
    pub fn connect(
        &mut self,
        from: NodeId,
        to: NodeId,
        format: AudioFormat,
    ) -> Result<(), GraphError> {
        let source = self.nodes.get(&from).ok_or(GraphError::NotAttached(from))?;
        let dest = self.nodes.get(&to).ok_or(GraphError::NotAttached(to))?;

        if format.sample_rate != self.sample_rate
            || format.channels != source.unit.output_channels()
            || format.channels != dest.unit.input_channels()
        {
            return Err(GraphError::FormatMismatch);
        }

        if from == to || self.reaches(to, from) {
            return Err(GraphError::CycleDetected);
        }

        let connection = Connection { from, to, format };
        if self.connections.insert(connection) {
            tracing::debug!("Connected {from} -> {to}");
            self.update_topology();
        }

        Ok(())
    }

    /// Disconnect two nodes
    pub fn disconnect(&mut self, from: NodeId, to: NodeId) {
        let before = self.connections.len();
        self.connections
            .retain(|c| !(c.from == from && c.to == to));
        if self.connections.len() != before {
            tracing::debug!("Disconnected {from} -> {to}");
            self.update_topology();
        }
    }

    /// Whether `goal` is reachable from `from` along existing edges
    fn reaches(&self, from: NodeId, goal: NodeId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == goal {
                return true;
            }
            if seen.insert(id) {
                for c in &self.connections {
                    if c.from == id {
                        stack.push(c.to);
                    }
                }
            }
        }
        false
    }

    /// Rebuild the processing order, fan-in map, and sink set.
    /// IMPORTANT: This allocates, so call it on topology edits, NOT in `process()`
    fn update_topology(&mut self) {
        // Edges are cycle-checked before insertion, so the sort cannot fail
        // here; keep the sorted-id fallback anyway rather than panic on the
        // render thread.
        match self.topological_sort() {
            Ok(order) => self.order = order,
            Err(remaining) => {
                tracing::warn!("Graph contains cycle involving nodes: {remaining:?}");
                self.order = self.nodes.keys().copied().collect();
                self.order.sort_unstable();
            }
        }

        self.incoming.clear();
        for c in &self.connections {
            self.incoming.entry(c.to).or_default().push(c.from);
        }

        let outgoing: HashSet<NodeId> = self.connections.iter().map(|c| c.from).collect();
        self.sinks = self
            .order
            .iter()
            .copied()
            .filter(|id| !outgoing.contains(id))
            .collect();
    }

    /// Topological sort via Kahn's algorithm, O(V + E).
    ///
    /// The min-heap keeps the order deterministic across runs: among ready
    /// nodes the lowest id goes first. Returns `Err(remaining)` when a
    /// cycle leaves nodes unprocessable.
    fn topological_sort(&self) -> Result<Vec<NodeId>, Vec<NodeId>> {
        let mut in_degree: HashMap<NodeId, usize> = HashMap::with_capacity(self.nodes.len());
        for &id in self.nodes.keys() {
            in_degree.insert(id, 0);
        }

        let mut adjacency: HashMap<NodeId, Vec<NodeId>> =
            HashMap::with_capacity(self.nodes.len());
        for c in &self.connections {
            *in_degree.entry(c.to).or_insert(0) += 1;
            adjacency.entry(c.from).or_default().push(c.to);
        }

        let mut queue: BinaryHeap<Reverse<NodeId>> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&id, _)| Reverse(id))
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(Reverse(id)) = queue.pop() {
            result.push(id);
            if let Some(outgoing) = adjacency.get(&id) {
                for &to in outgoing {
                    if let Some(degree) = in_degree.get_mut(&to) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push(Reverse(to));
                        }
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            Ok(result)
        } else {
            let processed: HashSet<NodeId> = result.into_iter().collect();
            let remaining: Vec<NodeId> = self
                .nodes
                .keys()
                .filter(|id| !processed.contains(id))
                .copied()
                .collect();
            Err(remaining)
        }
    }

    /// Reallocate all routing buffers for the current block size
    fn allocate_buffers(&mut self) {
        for node in self.nodes.values_mut() {
            let inputs = node.unit.input_channels();
            let outputs = node.unit.output_channels();
            node.input = vec![vec![0.0; self.block_size]; inputs];
            node.output = if node.in_place {
                Vec::new()
            } else {
                vec![vec![0.0; self.block_size]; outputs]
            };
        }
    }

    /// Process one block.
    ///
    /// Each node's input buffer is cleared, every connected source's
    /// rendered output is summed into it, then the node renders — in place
    /// when it opted in, otherwise into its own output buffer. Sinks (nodes
    /// with no outgoing edge) are summed additively into `system_output`.
    ///
    /// REAL-TIME SAFE: takes nodes out of the map and reinserts them (no
    /// allocation), never rebuilds topology here.
    pub fn process(&mut self, system_output: &mut [&mut [Sample]]) {
        for channel in system_output.iter_mut() {
            channel.fill(0.0);
        }
        if self.nodes.is_empty() {
            return;
        }

        let frames = system_output
            .first()
            .map_or(self.block_size, |ch| ch.len())
            .min(self.block_size);

        for i in 0..self.order.len() {
            let id = self.order[i];
            // Taking the node out lets us read its sources through shared
            // borrows of the map while holding the node mutably.
            let Some(mut node) = self.nodes.remove(&id) else {
                continue;
            };

            for channel in &mut node.input {
                channel[..frames].fill(0.0);
            }
            if let Some(sources) = self.incoming.get(&id) {
                for &source_id in sources {
                    if let Some(source) = self.nodes.get(&source_id) {
                        for (input_ch, source_ch) in
                            node.input.iter_mut().zip(source.rendered())
                        {
                            for (input_sample, &source_sample) in
                                input_ch[..frames].iter_mut().zip(&source_ch[..frames])
                            {
                                *input_sample += source_sample;
                            }
                        }
                    }
                }
            }

            // Process (errors ignored - real-time safe, silence on error)
            if node.in_place {
                let mut io: SmallVec<[&mut [Sample]; 8]> = node
                    .input
                    .iter_mut()
                    .map(|ch| &mut ch[..frames])
                    .collect();
                let _ = node.unit.process_in_place(&mut io, frames);
            } else {
                let input_refs: SmallVec<[&[Sample]; 8]> =
                    node.input.iter().map(|ch| &ch[..frames]).collect();
                let mut output_refs: SmallVec<[&mut [Sample]; 8]> = node
                    .output
                    .iter_mut()
                    .map(|ch| &mut ch[..frames])
                    .collect();
                let mut audio = AudioBuffer {
                    inputs: &input_refs,
                    outputs: &mut output_refs,
                    frames,
                };
                let _ = node.unit.process(&mut audio);
            }

            self.nodes.insert(id, node);
        }

        for &id in &self.sinks {
            if let Some(node) = self.nodes.get(&id) {
                for (sys_ch, node_ch) in system_output.iter_mut().zip(node.rendered()) {
                    let len = sys_ch.len().min(frames);
                    for (sys_sample, &node_sample) in
                        sys_ch[..len].iter_mut().zip(&node_ch[..len])
                    {
                        *sys_sample += node_sample;
                    }
                }
            }
        }
    }
}

impl Default for AudioGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodus_core::ChannelCount;

    /// Source with no inputs that emits a constant value on every channel
    struct ConstSource {
        value: Sample,
        channels: ChannelCount,
    }

    impl AudioUnit for ConstSource {
        fn initialize(&mut self, _: SampleRate, _: Frames) -> Result<(), UnitError> {
            Ok(())
        }

        fn process(&mut self, audio: &mut AudioBuffer) -> Result<(), UnitError> {
            for ch in audio.outputs.iter_mut() {
                ch[..audio.frames].fill(self.value);
            }
            Ok(())
        }

        fn input_channels(&self) -> ChannelCount {
            0
        }

        fn output_channels(&self) -> ChannelCount {
            self.channels
        }
    }

    /// Copies input to output without opting into in-place rendering
    struct PassUnit {
        channels: ChannelCount,
    }

    impl AudioUnit for PassUnit {
        fn initialize(&mut self, _: SampleRate, _: Frames) -> Result<(), UnitError> {
            Ok(())
        }

        fn process(&mut self, audio: &mut AudioBuffer) -> Result<(), UnitError> {
            for (input, output) in audio.inputs.iter().zip(audio.outputs.iter_mut()) {
                output[..audio.frames].copy_from_slice(&input[..audio.frames]);
            }
            Ok(())
        }

        fn input_channels(&self) -> ChannelCount {
            self.channels
        }

        fn output_channels(&self) -> ChannelCount {
            self.channels
        }
    }

    /// Doubles the signal in place
    struct DoubleInPlace {
        channels: ChannelCount,
    }

    impl AudioUnit for DoubleInPlace {
        fn initialize(&mut self, _: SampleRate, _: Frames) -> Result<(), UnitError> {
            Ok(())
        }

        fn process(&mut self, _: &mut AudioBuffer) -> Result<(), UnitError> {
            Err(UnitError::ProcessingFailed("in-place only".to_string()))
        }

        fn can_process_in_place(&self) -> bool {
            true
        }

        fn process_in_place(
            &mut self,
            io: &mut [&mut [Sample]],
            frames: Frames,
        ) -> Result<(), UnitError> {
            for ch in io.iter_mut() {
                for sample in &mut ch[..frames] {
                    *sample *= 2.0;
                }
            }
            Ok(())
        }

        fn input_channels(&self) -> ChannelCount {
            self.channels
        }

        fn output_channels(&self) -> ChannelCount {
            self.channels
        }
    }

    fn source(value: Sample) -> Box<dyn AudioUnit> {
        Box::new(ConstSource { value, channels: 2 })
    }

    fn pass() -> Box<dyn AudioUnit> {
        Box::new(PassUnit { channels: 2 })
    }

    fn stereo(graph: &AudioGraph) -> AudioFormat {
        AudioFormat::stereo(graph.sample_rate())
    }

    fn attach(graph: &mut AudioGraph, unit: Box<dyn AudioUnit>) -> NodeId {
        let format = stereo(graph);
        graph.attach(NodeEntry::new(unit, format)).unwrap()
    }

    fn render(graph: &mut AudioGraph, frames: usize) -> Vec<Vec<Sample>> {
        let mut output = vec![vec![0.0_f32; frames]; 2];
        let mut refs: Vec<&mut [Sample]> = output.iter_mut().map(Vec::as_mut_slice).collect();
        graph.process(&mut refs);
        output
    }

    #[test]
    fn attach_is_idempotent_by_id() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let id = NodeId::next();
        let format = stereo(&graph);

        graph
            .attach(NodeEntry::with_id(id, pass(), format))
            .unwrap();
        let again = graph
            .attach(NodeEntry::with_id(id, pass(), format))
            .unwrap();

        assert_eq!(again, id);
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn connect_requires_attached_endpoints() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let a = attach(&mut graph, pass());
        let ghost = NodeId::next();
        let format = stereo(&graph);

        assert_eq!(
            graph.connect(ghost, a, format),
            Err(GraphError::NotAttached(ghost))
        );
        assert_eq!(
            graph.connect(a, ghost, format),
            Err(GraphError::NotAttached(ghost))
        );
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn connect_rejects_channel_mismatch() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let mono = graph
            .attach(NodeEntry::new(
                Box::new(PassUnit { channels: 1 }),
                AudioFormat::mono(48000),
            ))
            .unwrap();
        let st = attach(&mut graph, pass());

        // Edge declared stereo, but the source is mono
        assert_eq!(
            graph.connect(mono, st, AudioFormat::stereo(48000)),
            Err(GraphError::FormatMismatch)
        );
        // Edge matching the source but not the destination
        assert_eq!(
            graph.connect(mono, st, AudioFormat::mono(48000)),
            Err(GraphError::FormatMismatch)
        );
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn connect_rejects_sample_rate_mismatch() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let a = attach(&mut graph, pass());
        let b = attach(&mut graph, pass());

        assert_eq!(
            graph.connect(a, b, AudioFormat::stereo(44100)),
            Err(GraphError::FormatMismatch)
        );
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let a = attach(&mut graph, pass());

        assert_eq!(
            graph.connect(a, a, stereo(&graph)),
            Err(GraphError::CycleDetected)
        );
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn cycle_is_rejected_and_graph_unchanged() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let a = attach(&mut graph, pass());
        let b = attach(&mut graph, pass());
        let c = attach(&mut graph, pass());
        let format = stereo(&graph);

        graph.connect(a, b, format).unwrap();
        graph.connect(b, c, format).unwrap();

        // Closing the loop must leave the two existing edges intact
        assert_eq!(graph.connect(c, a, format), Err(GraphError::CycleDetected));
        assert_eq!(graph.connection_count(), 2);
        assert!(graph.is_connected(a, b));
        assert!(graph.is_connected(b, c));
        assert!(!graph.is_connected(c, a));
    }

    #[test]
    fn duplicate_connect_is_noop() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let a = attach(&mut graph, pass());
        let b = attach(&mut graph, pass());
        let format = stereo(&graph);

        graph.connect(a, b, format).unwrap();
        graph.connect(a, b, format).unwrap();
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn detach_refused_while_connected() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let a = attach(&mut graph, pass());
        let b = attach(&mut graph, pass());
        graph.connect(a, b, stereo(&graph)).unwrap();

        assert_eq!(graph.detach(a), Err(GraphError::NodeStillConnected(a)));
        assert_eq!(graph.detach(b), Err(GraphError::NodeStillConnected(b)));

        graph.disconnect(a, b);
        graph.detach(a).unwrap();
        graph.detach(b).unwrap();
        assert_eq!(graph.node_count(), 0);

        assert_eq!(graph.detach(a), Err(GraphError::NotAttached(a)));
    }

    #[test]
    fn processing_order_respects_dependencies() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let a = attach(&mut graph, pass());
        let b = attach(&mut graph, pass());
        let c = attach(&mut graph, pass());
        let format = stereo(&graph);

        // Connect in reverse order to exercise the sort
        graph.connect(c, b, format).unwrap();
        graph.connect(b, a, format).unwrap();

        let pos = |id| graph.order.iter().position(|&n| n == id).unwrap();
        assert!(pos(c) < pos(b));
        assert!(pos(b) < pos(a));
    }

    #[test]
    fn empty_graph_outputs_silence() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let output = render(&mut graph, 64);
        assert_eq!(output[0][0], 0.0);
        assert_eq!(output[1][0], 0.0);
    }

    #[test]
    fn source_chain_passes_through_to_output() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let src = attach(&mut graph, source(0.5));
        let through = attach(&mut graph, pass());
        graph.connect(src, through, stereo(&graph)).unwrap();

        let output = render(&mut graph, 64);
        assert_eq!(output[0][0], 0.5);
        assert_eq!(output[1][63], 0.5);
    }

    #[test]
    fn fan_in_is_summed() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let a = attach(&mut graph, source(0.25));
        let b = attach(&mut graph, source(0.5));
        let sum = attach(&mut graph, pass());
        let format = stereo(&graph);
        graph.connect(a, sum, format).unwrap();
        graph.connect(b, sum, format).unwrap();

        let output = render(&mut graph, 64);
        assert!((output[0][0] - 0.75).abs() < 1e-6);
        assert!((output[1][0] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn in_place_node_renders_into_its_input() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let src = attach(&mut graph, source(0.25));
        let double = attach(&mut graph, Box::new(DoubleInPlace { channels: 2 }));
        graph.connect(src, double, stereo(&graph)).unwrap();

        let output = render(&mut graph, 64);
        assert!((output[0][0] - 0.5).abs() < 1e-6);
        assert!((output[1][0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn multiple_sinks_are_mixed_additively() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let src = attach(&mut graph, source(0.5));
        let b = attach(&mut graph, pass());
        let c = attach(&mut graph, pass());
        let format = stereo(&graph);
        graph.connect(src, b, format).unwrap();
        graph.connect(src, c, format).unwrap();

        let output = render(&mut graph, 64);
        assert!((output[0][0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn detached_node_no_longer_renders() {
        let mut graph = AudioGraph::with_config(48000, 64);
        let src = attach(&mut graph, source(0.5));

        let output = render(&mut graph, 64);
        assert_eq!(output[0][0], 0.5);

        graph.detach(src).unwrap();
        let output = render(&mut graph, 64);
        assert_eq!(output[0][0], 0.0);
    }
}
