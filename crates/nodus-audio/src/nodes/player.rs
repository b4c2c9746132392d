//! File playback node.
//!
//! The file is decoded up front ([`crate::file::load_wav`]); the render
//! unit just walks a finished sample buffer. Transport control (play,
//! pause, stop, reschedule) travels through a single packed atomic word,
//! so control calls coalesce safely: if several land between two blocks
//! the render side acts on the last one only.
//!
//! Looping is a scheduling property, not a live switch. Toggling it takes
//! effect the next time the buffer is (re)scheduled, which happens at
//! construction and on `play()` from a non-playing state.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use nodus_core::{AudioFormat, ChannelCount, Frames, NodeId, Sample, SampleRate};
use nodus_unit::{
    AudioBuffer, AudioUnit, ParamAddress, ParamTable, ParameterSpec, ParameterUnit, UnitError,
};

use crate::file::{self, SampleBuffer};
use crate::graph::{AudioGraph, NodeEntry};
use crate::nodes::ConstructionError;

/// Address of the playback volume parameter
pub const VOLUME_ADDRESS: ParamAddress = 0;
/// Address of the stereo pan parameter
pub const PAN_ADDRESS: ParamAddress = 1;

const DEFAULT_VOLUME: f32 = 1.0;
const DEFAULT_PAN: f32 = 0.0;

/// Where the player is in its transport cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing scheduled; output is silence
    Stopped,
    /// Buffer scheduled from the top, waiting for `play()`
    Scheduled,
    /// Advancing through the buffer
    Playing,
    /// Holding position; `play()` resumes where playback left off
    Paused,
}

// Transport word layout: bits 0-7 carry the transport code, bit 8 the
// looping flag, bits 16-31 a schedule generation. The render side resets
// its play position only when the generation changes, so pause/resume
// (same generation) keeps position while play-from-stopped (new
// generation) starts over.
const TRANSPORT_STOPPED: u32 = 0;
const TRANSPORT_PLAYING: u32 = 1;
const TRANSPORT_PAUSED: u32 = 2;
const TRANSPORT_SCHEDULED: u32 = 3;
const TRANSPORT_MASK: u32 = 0xFF;
const LOOP_BIT: u32 = 1 << 8;
const GEN_SHIFT: u32 = 16;

/// Single-writer/single-reader transport word
#[derive(Debug)]
struct TransportSlot(AtomicU32);

impl TransportSlot {
    fn new() -> Self {
        Self(AtomicU32::new(TRANSPORT_STOPPED))
    }

    fn store(&self, transport: u32, looping: bool, generation: u16) {
        let mut word = transport | (u32::from(generation) << GEN_SHIFT);
        if looping {
            word |= LOOP_BIT;
        }
        self.0.store(word, Ordering::Release);
    }

    fn load(&self) -> (u32, bool, u16) {
        let word = self.0.load(Ordering::Acquire);
        (
            word & TRANSPORT_MASK,
            word & LOOP_BIT != 0,
            (word >> GEN_SHIFT) as u16,
        )
    }
}

/// Control-side handle to a file playback node.
///
/// Construction loads and decodes the file, attaches the render unit, and
/// schedules the buffer from the top, so the first `play()` starts
/// immediately.
#[derive(Debug)]
pub struct AudioPlayer {
    id: NodeId,
    params: Arc<ParamTable>,
    transport: Arc<TransportSlot>,
    state: PlaybackState,
    looping: bool,
    generation: u16,
}

impl AudioPlayer {
    /// Load a WAV file and attach a player for it.
    ///
    /// The node always renders stereo at the graph's sample rate. A file
    /// recorded at a different rate is played as-is (no resampling), which
    /// shifts its pitch.
    pub fn new(graph: &mut AudioGraph, path: impl AsRef<Path>) -> Result<Self, ConstructionError> {
        let path = path.as_ref();
        let buffer = file::load_wav(path)?;
        if buffer.sample_rate != graph.sample_rate() {
            tracing::warn!(
                "{} is {} Hz but the graph runs at {} Hz; playback speed will be off",
                path.display(),
                buffer.sample_rate,
                graph.sample_rate()
            );
        }

        let table = ParamTable::new(vec![
            ParameterSpec {
                identifier: "volume".to_string(),
                address: VOLUME_ADDRESS,
                name: "Volume".to_string(),
                unit: ParameterUnit::LinearGain,
                min: 0.0,
                max: 2.0,
                ramp_capable: false,
                default: DEFAULT_VOLUME,
            },
            ParameterSpec {
                identifier: "pan".to_string(),
                address: PAN_ADDRESS,
                name: "Pan".to_string(),
                unit: ParameterUnit::Pan,
                min: -1.0,
                max: 1.0,
                ramp_capable: false,
                default: DEFAULT_PAN,
            },
        ])?;

        let transport = Arc::new(TransportSlot::new());
        let unit = PlayerUnit::new(buffer, table, Arc::clone(&transport));
        let params = unit.param_handle();
        let format = AudioFormat::stereo(graph.sample_rate());

        let id = graph
            .attach(NodeEntry::new(Box::new(unit), format))
            .map_err(ConstructionError::InvalidConfig)?;

        let mut player = Self {
            id,
            params,
            transport,
            state: PlaybackState::Stopped,
            looping: false,
            generation: 0,
        };
        player.reschedule(TRANSPORT_SCHEDULED);
        player.state = PlaybackState::Scheduled;
        Ok(player)
    }

    /// The player's node id, for wiring it into the graph
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.id
    }

    /// Current transport state
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether the next schedule will loop
    #[must_use]
    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Choose looping for the next (re)schedule. Playback already in
    /// flight is not affected.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Start or resume playback.
    ///
    /// A no-op while already playing. From `Paused` the position is kept;
    /// from `Stopped` or `Scheduled` the buffer is rescheduled from the
    /// top with the currently configured looping mode.
    pub fn play(&mut self) {
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Paused => {
                self.publish(TRANSPORT_PLAYING);
                self.state = PlaybackState::Playing;
            }
            PlaybackState::Stopped | PlaybackState::Scheduled => {
                self.reschedule(TRANSPORT_PLAYING);
                self.state = PlaybackState::Playing;
            }
        }
    }

    /// Hold playback at the current position. A no-op unless playing.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.publish(TRANSPORT_PAUSED);
            self.state = PlaybackState::Paused;
        }
    }

    /// Stop playback and discard the scheduled buffer. The next `play()`
    /// starts from the top.
    pub fn stop(&mut self) {
        if self.state != PlaybackState::Stopped {
            self.publish(TRANSPORT_STOPPED);
            self.state = PlaybackState::Stopped;
        }
    }

    /// Set playback volume; clamped to `[0, 2]`, applied at the next block
    pub fn set_volume(&self, volume: f32) {
        let _ = self.params.write(VOLUME_ADDRESS, volume, false);
    }

    /// Current volume
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.params.target(VOLUME_ADDRESS).unwrap_or(DEFAULT_VOLUME)
    }

    /// Set stereo pan; clamped to `[-1, 1]`, applied at the next block
    pub fn set_pan(&self, pan: f32) {
        let _ = self.params.write(PAN_ADDRESS, pan, false);
    }

    /// Current pan
    #[must_use]
    pub fn pan(&self) -> f32 {
        self.params.target(PAN_ADDRESS).unwrap_or(DEFAULT_PAN)
    }

    fn publish(&self, transport: u32) {
        self.transport.store(transport, self.looping, self.generation);
    }

    fn reschedule(&mut self, transport: u32) {
        self.generation = self.generation.wrapping_add(1);
        self.publish(transport);
    }
}

/// Constant-power pan: equal perceived loudness across the stereo field
fn pan_gains(pan: f32) -> (f32, f32) {
    let normalized = (pan + 1.0) * 0.5;
    let angle = normalized * std::f32::consts::FRAC_PI_2;
    (angle.cos(), angle.sin())
}

/// Render-side playback unit
struct PlayerUnit {
    samples: Box<[Sample]>,
    frame_count: usize,
    position: usize,
    /// Whether a scheduled buffer is available to play
    armed: bool,
    looping: bool,
    transport: Arc<TransportSlot>,
    generation: u16,
    params: Arc<ParamTable>,
    volume: f32,
    pan: f32,
    volume_generation: u16,
    pan_generation: u16,
}

impl PlayerUnit {
    fn new(buffer: SampleBuffer, params: ParamTable, transport: Arc<TransportSlot>) -> Self {
        let frame_count = buffer.frames();
        Self {
            samples: buffer.samples.into_boxed_slice(),
            frame_count,
            position: 0,
            armed: false,
            looping: false,
            transport,
            generation: 0,
            params: Arc::new(params),
            volume: DEFAULT_VOLUME,
            pan: DEFAULT_PAN,
            volume_generation: 0,
            pan_generation: 0,
        }
    }

    fn param_handle(&self) -> Arc<ParamTable> {
        Arc::clone(&self.params)
    }
}

impl AudioUnit for PlayerUnit {
    fn initialize(&mut self, _: SampleRate, _: Frames) -> Result<(), UnitError> {
        Ok(())
    }

    // REAL-TIME SAFE: reads atomics and the sample buffer only
    fn process(&mut self, audio: &mut AudioBuffer) -> Result<(), UnitError> {
        if audio.outputs.len() != 2 {
            return Err(UnitError::ProcessingFailed(format!(
                "player renders stereo, got {} output channels",
                audio.outputs.len()
            )));
        }

        if let Some((value, _)) = self.params.poll(VOLUME_ADDRESS, &mut self.volume_generation) {
            self.volume = value;
        }
        if let Some((value, _)) = self.params.poll(PAN_ADDRESS, &mut self.pan_generation) {
            self.pan = value;
        }

        let (code, looping, generation) = self.transport.load();
        if generation != self.generation {
            // A fresh schedule: latch its looping mode, start from the top
            self.generation = generation;
            self.position = 0;
            self.looping = looping;
            self.armed = true;
        }
        if code == TRANSPORT_STOPPED {
            self.armed = false;
            self.position = 0;
        }

        let advancing = code == TRANSPORT_PLAYING;
        let (left_pan, right_pan) = pan_gains(self.pan);
        let left_gain = left_pan * self.volume;
        let right_gain = right_pan * self.volume;

        for frame in 0..audio.frames {
            let (left, right) = if advancing && self.armed && self.position < self.frame_count {
                let base = self.position * 2;
                self.position += 1;
                if self.position >= self.frame_count {
                    if self.looping {
                        self.position = 0;
                    } else {
                        // Exhausted; silence until the next schedule
                        self.armed = false;
                    }
                }
                (
                    self.samples[base] * left_gain,
                    self.samples[base + 1] * right_gain,
                )
            } else {
                (0.0, 0.0)
            };
            audio.outputs[0][frame] = left;
            audio.outputs[1][frame] = right;
        }

        Ok(())
    }

    fn input_channels(&self) -> ChannelCount {
        0
    }

    fn output_channels(&self) -> ChannelCount {
        2
    }

    fn params(&self) -> Option<&Arc<ParamTable>> {
        Some(&self.params)
    }
}
