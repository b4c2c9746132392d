//! Parameter registry and lock-free dispatch.
//!
//! Every tunable on a node is declared once, at construction, as a
//! [`ParameterSpec`] with a stable numeric address. All later mutation goes
//! through [`ParamTable::write`], which clamps the value to the declared
//! range and publishes it into a single-writer/single-reader atomic slot.
//! The render thread polls the slots at block boundaries — no locks, no
//! allocation, no blocking on either side.
//!
//! Ramped writes are interpolated toward the target over the table's
//! configured ramp duration (default 0, meaning immediate) using [`Ramp`]
//! on the render side, so a parameter change never produces a step larger
//! than one ramp increment per sample.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use nodus_core::SampleRate;

/// Numeric parameter address, unique within one node's parameter set
pub type ParamAddress = u32;

/// Unit of measure for a parameter, for display and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterUnit {
    /// Dimensionless value
    Generic,
    /// Frequency in Hz
    Hertz,
    /// Time in seconds
    Seconds,
    /// Linear amplitude factor
    LinearGain,
    /// Stereo position, -1 (left) to 1 (right)
    Pan,
}

/// Declarative description of one tunable parameter.
///
/// Created at node construction and never removed while the node lives.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    /// Short programmatic identifier, e.g. `"centerFrequency"`
    pub identifier: String,
    /// Address the dispatcher routes writes by; stable for the node's lifetime
    pub address: ParamAddress,
    /// Human-readable name, e.g. `"Center Frequency (Hz)"`
    pub name: String,
    /// Unit of measure
    pub unit: ParameterUnit,
    /// Lower bound; writes below are clamped, not rejected
    pub min: f32,
    /// Upper bound; writes above are clamped, not rejected
    pub max: f32,
    /// Whether the parameter supports ramped transitions
    pub ramp_capable: bool,
    /// Initial value
    pub default: f32,
}

/// Parameter-related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    /// Two parameters on one node declared the same address
    #[error("duplicate parameter address {0}")]
    DuplicateAddress(ParamAddress),

    /// Write to an address no parameter was declared under
    #[error("unknown parameter address {0}")]
    UnknownAddress(ParamAddress),
}

// Slot word layout: bits 0-31 are the f32 target value, bit 32 flags a
// ramped write, bits 48-63 carry a write generation so the reader can tell
// a fresh write from the value it already consumed.
const RAMPED_BIT: u64 = 1 << 32;
const GEN_SHIFT: u32 = 48;

/// One single-writer/single-reader slot. The control domain stores whole
/// words, the render domain loads whole words; neither side ever waits.
#[derive(Debug)]
struct ParamSlot(AtomicU64);

impl ParamSlot {
    fn new(value: f32) -> Self {
        Self(AtomicU64::new(u64::from(value.to_bits())))
    }

    fn store(&self, value: f32, ramped: bool) {
        let prev = self.0.load(Ordering::Acquire);
        let generation = ((prev >> GEN_SHIFT) as u16).wrapping_add(1);
        let mut word = u64::from(value.to_bits()) | (u64::from(generation) << GEN_SHIFT);
        if ramped {
            word |= RAMPED_BIT;
        }
        self.0.store(word, Ordering::Release);
    }

    fn load(&self) -> (f32, bool, u16) {
        let word = self.0.load(Ordering::Acquire);
        let value = f32::from_bits(word as u32);
        let ramped = word & RAMPED_BIT != 0;
        let generation = (word >> GEN_SHIFT) as u16;
        (value, ramped, generation)
    }
}

#[derive(Debug)]
struct ParamEntry {
    spec: ParameterSpec,
    slot: ParamSlot,
}

/// Registry plus dispatcher for one node's parameters.
///
/// Shared as `Arc<ParamTable>` between the control-side node handle and the
/// render-side unit. Addresses are validated for uniqueness at construction
/// ([`ParamError::DuplicateAddress`] is construction-time fatal for the
/// node); afterwards the table is structurally immutable and all methods
/// take `&self`.
#[derive(Debug)]
pub struct ParamTable {
    entries: Vec<ParamEntry>,
    /// Ramp duration in seconds, stored as f32 bits
    ramp_seconds: AtomicU32,
}

impl ParamTable {
    /// Build a table from declared specs, initializing each slot to its
    /// default value.
    pub fn new(specs: Vec<ParameterSpec>) -> Result<Self, ParamError> {
        let mut entries: Vec<ParamEntry> = Vec::with_capacity(specs.len());
        for spec in specs {
            if entries.iter().any(|e| e.spec.address == spec.address) {
                return Err(ParamError::DuplicateAddress(spec.address));
            }
            let slot = ParamSlot::new(spec.default.clamp(spec.min, spec.max));
            entries.push(ParamEntry { spec, slot });
        }
        Ok(Self {
            entries,
            ramp_seconds: AtomicU32::new(0.0_f32.to_bits()),
        })
    }

    /// Dispatch a value to a parameter.
    ///
    /// The value is clamped to the declared `[min, max]` range — out-of-range
    /// writes are not an error. A ramped write to a parameter that is not
    /// ramp-capable is applied immediately instead. Exactly one slot is
    /// updated; this path never allocates.
    pub fn write(&self, address: ParamAddress, value: f32, ramped: bool) -> Result<(), ParamError> {
        let entry = self
            .entry(address)
            .ok_or(ParamError::UnknownAddress(address))?;
        let clamped = value.clamp(entry.spec.min, entry.spec.max);
        entry.slot.store(clamped, ramped && entry.spec.ramp_capable);
        Ok(())
    }

    /// Current target value of a parameter (control-side readback)
    pub fn target(&self, address: ParamAddress) -> Option<f32> {
        self.entry(address).map(|e| e.slot.load().0)
    }

    /// Spec for a given address
    pub fn spec(&self, address: ParamAddress) -> Option<&ParameterSpec> {
        self.entry(address).map(|e| &e.spec)
    }

    /// All declared specs, in declaration order
    pub fn specs(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.entries.iter().map(|e| &e.spec)
    }

    /// Number of declared parameters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table declares no parameters
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configure the ramp duration used for ramped writes.
    ///
    /// Default is 0 seconds, meaning ramped writes are applied immediately.
    /// Negative values are treated as 0.
    pub fn set_ramp_duration(&self, seconds: f32) {
        self.ramp_seconds
            .store(seconds.max(0.0).to_bits(), Ordering::Release);
    }

    /// Current ramp duration in seconds
    pub fn ramp_duration(&self) -> f32 {
        f32::from_bits(self.ramp_seconds.load(Ordering::Acquire))
    }

    /// Ramp duration converted to whole frames at the given sample rate
    pub fn ramp_frames(&self, sample_rate: SampleRate) -> u32 {
        (self.ramp_duration() * sample_rate as f32) as u32
    }

    /// Render-side poll by address: returns `(value, ramped)` once per
    /// fresh write, tracked through the caller-held generation.
    pub fn poll(&self, address: ParamAddress, last_generation: &mut u16) -> Option<(f32, bool)> {
        let entry = self.entry(address)?;
        let (value, ramped, generation) = entry.slot.load();
        if generation == *last_generation {
            return None;
        }
        *last_generation = generation;
        Some((value, ramped))
    }

    /// Render-side poll by declaration index, for units that iterate every
    /// parameter (kernel adapters). Returns `(address, value, ramped)`.
    pub fn poll_index(&self, index: usize, last_generation: &mut u16) -> Option<(ParamAddress, f32, bool)> {
        let entry = self.entries.get(index)?;
        let (value, ramped, generation) = entry.slot.load();
        if generation == *last_generation {
            return None;
        }
        *last_generation = generation;
        Some((entry.spec.address, value, ramped))
    }

    fn entry(&self, address: ParamAddress) -> Option<&ParamEntry> {
        // Tables hold a handful of parameters; linear scan beats hashing.
        self.entries.iter().find(|e| e.spec.address == address)
    }
}

/// Render-side linear interpolator toward a parameter target.
///
/// One instance per ramp-capable parameter, owned by the unit. Advancing is
/// one add per sample, so ramping costs the same whether the target is near
/// or far.
#[derive(Debug, Clone)]
pub struct Ramp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
}

impl Ramp {
    /// Start at a settled value
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Jump to `value` with no interpolation
    #[inline]
    pub fn snap(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Interpolate linearly toward `target` over `frames` samples
    pub fn set_target(&mut self, target: f32, frames: u32) {
        if frames == 0 {
            self.snap(target);
            return;
        }
        self.target = target;
        self.step = (target - self.current) / frames as f32;
        self.remaining = frames;
    }

    /// Apply a polled write: ramped writes interpolate over `frames`,
    /// immediate writes snap.
    pub fn retarget(&mut self, value: f32, ramped: bool, frames: u32) {
        if ramped {
            self.set_target(value, frames);
        } else {
            self.snap(value);
        }
    }

    /// Advance one sample and return the new value
    #[inline]
    pub fn advance(&mut self) -> f32 {
        if self.remaining > 0 {
            self.current += self.step;
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            }
        }
        self.current
    }

    /// Current value without advancing
    #[inline]
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Whether the ramp has reached its target
    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }
}
