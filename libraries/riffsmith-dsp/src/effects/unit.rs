//! Effect unit contract
//!
//! Every stage of the guitar chain implements [`EffectUnit`]. Units own all
//! of their state (filters, delay lines, oscillators, envelopes) and read
//! their parameters from a shared `Arc` of atomics once per block.

use crate::buffer::{AudioBuffer, ProcessSpec};
use riffsmith_core::BlockKind;
use tracing::debug;

/// Lifecycle of an effect unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Constructed, never prepared; processing is a pass-through
    Uninitialized,
    /// Buffers sized for the current spec; processing active
    Prepared,
    /// Resources dropped; processing is a pass-through until re-prepared
    Released,
}

/// Trait for the effect stages of the chain
///
/// # Real-Time Constraints
/// - `process_block` must not allocate, lock or block
/// - Out-of-range parameters are clamped when written, never reported here
/// - A disabled, unprepared or released unit leaves the buffer untouched
pub trait EffectUnit: Send {
    /// Size every rate-dependent buffer and clear transient state
    ///
    /// Calling it again (for example at a new sample rate) is supported and
    /// resets all history.
    fn prepare(&mut self, spec: &ProcessSpec);

    /// Process one block in place
    fn process_block(&mut self, buffer: &mut AudioBuffer);

    /// Drop prepared resources
    fn release(&mut self);

    /// Clear history (delay lines, envelopes, filter state), keep buffers
    fn reset(&mut self);

    /// Whether the unit currently processes audio
    fn is_enabled(&self) -> bool;

    /// Current lifecycle state
    fn state(&self) -> UnitState;

    /// Which preset block drives this unit
    fn kind(&self) -> BlockKind;

    /// Display name (for logging)
    fn name(&self) -> &'static str;
}

/// Lifecycle bookkeeping shared by all units
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    state: UnitState,
    spec: Option<ProcessSpec>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: UnitState::Uninitialized,
            spec: None,
        }
    }

    pub fn prepare(&mut self, name: &str, spec: &ProcessSpec) {
        debug!(
            unit = name,
            sample_rate = spec.sample_rate(),
            block_size = spec.max_block_size(),
            channels = spec.num_channels(),
            "Preparing effect unit"
        );
        self.state = UnitState::Prepared;
        self.spec = Some(*spec);
    }

    pub fn release(&mut self, name: &str) {
        if self.state == UnitState::Prepared {
            debug!(unit = name, "Releasing effect unit");
        }
        self.state = UnitState::Released;
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn is_prepared(&self) -> bool {
        self.state == UnitState::Prepared
    }

    /// Sample rate of the active spec (0 when not prepared)
    pub fn sample_rate(&self) -> f32 {
        self.spec.map_or(0.0, |s| s.sample_rate())
    }

    pub fn spec(&self) -> Option<ProcessSpec> {
        self.spec
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
