//! Click-free parameter smoothing across the control/audio thread boundary
//!
//! A [`SmoothedParameterSet`] lives on the audio thread and owns one
//! [`LinearRamp`] per registered parameter. Control threads talk to it through
//! cloneable [`SmootherHandle`]s that publish commands on a shared bus:
//!
//! - each slot holds the latest `(target, ramp seconds)` pair packed into one
//!   `AtomicU64`, plus a sequence counter bumped after every write
//! - the audio thread picks up new commands at the start of `advance`, so a
//!   target change always lands on a block boundary
//! - bulk transitions stage their targets under a control-side mutex and
//!   publish them inside a seqlock window; the audio thread only applies a
//!   pickup when no window was open while it read, so every staged parameter
//!   starts gliding in the same block
//!
//! The audio thread never locks or allocates: pickup scratch space is sized
//! when parameters are registered.

use crate::error::{DspError, Result};
use crate::params::AtomicF32;
use std::collections::HashMap;
use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Distance at which a ramp snaps onto its target
pub const SMOOTHING_EPSILON: f32 = 1e-3;

/// Ramp used when callers don't specify one
pub const DEFAULT_RAMP_SECONDS: f32 = 0.05;

/// Ramp used for preset-wide transitions
pub const BULK_RAMP_SECONDS: f32 = 0.1;

const DEFAULT_SAMPLE_RATE: f32 = 44_100.0;

/// Index of a registered parameter, for lookup-free reads on the audio thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(usize);

impl ParamId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Linear interpolation from the current value toward a target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
}

impl LinearRamp {
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
        }
    }

    /// Restart the ramp from the current value; zero samples snaps
    pub fn set_target(&mut self, target: f32, ramp_samples: u32) {
        self.target = target;
        if ramp_samples == 0 || (target - self.current).abs() < SMOOTHING_EPSILON {
            self.snap();
        } else {
            self.step = (target - self.current) / ramp_samples as f32;
            self.remaining = ramp_samples;
        }
    }

    /// Jump to a value with no ramp
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.snap();
    }

    /// Advance by `samples` and return the new current value
    #[inline]
    pub fn advance(&mut self, samples: u32) -> f32 {
        if self.remaining == 0 {
            return self.current;
        }
        if samples >= self.remaining {
            self.snap();
        } else {
            self.current += self.step * samples as f32;
            self.remaining -= samples;
            if (self.target - self.current).abs() < SMOOTHING_EPSILON {
                self.snap();
            }
        }
        self.current
    }

    /// Advance by one sample
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        self.advance(1)
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    fn snap(&mut self) {
        self.current = self.target;
        self.step = 0.0;
        self.remaining = 0;
    }
}

#[inline]
fn pack(target: f32, ramp_seconds: f32) -> u64 {
    (u64::from(target.to_bits()) << 32) | u64::from(ramp_seconds.to_bits())
}

#[inline]
fn unpack(command: u64) -> (f32, f32) {
    (
        f32::from_bits((command >> 32) as u32),
        f32::from_bits(command as u32),
    )
}

/// Per-parameter mailbox between control threads and the audio thread
#[derive(Debug)]
struct Slot {
    name: String,
    command: AtomicU64,
    seq: AtomicU32,
    applied_seq: AtomicU32,
    current: AtomicF32,
    active: AtomicBool,
}

impl Slot {
    fn new(name: String, initial: f32) -> Self {
        Self {
            name,
            command: AtomicU64::new(pack(initial, 0.0)),
            seq: AtomicU32::new(0),
            applied_seq: AtomicU32::new(0),
            current: AtomicF32::new(initial),
            active: AtomicBool::new(false),
        }
    }

    /// The command can become visible before the bumped `seq`, so a reader
    /// may see it twice: once under the old sequence and once under the new.
    fn publish(&self, target: f32, ramp_seconds: f32) {
        self.command
            .store(pack(target, ramp_seconds.max(0.0)), Ordering::Release);
        self.seq.fetch_add(1, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct BulkState {
    open: bool,
    ramp_seconds: f32,
    staged: Vec<Option<f32>>,
}

/// State shared by the audio-side set and every handle
#[derive(Debug)]
struct SmoothingBus {
    slots: Vec<Slot>,
    index: HashMap<String, ParamId>,
    /// Odd while a bulk transition is being published
    epoch: AtomicU32,
    bulk: Mutex<BulkState>,
}

impl SmoothingBus {
    fn lookup(&self, name: &str) -> Result<ParamId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| DspError::UnknownParameter(name.to_string()))
    }

    fn lock_bulk(&self) -> MutexGuard<'_, BulkState> {
        self.bulk.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_target(&self, name: &str, value: f32, ramp_seconds: f32) -> Result<()> {
        let id = self.lookup(name)?;
        if !value.is_finite() {
            return Err(DspError::NonFiniteValue(name.to_string()));
        }
        let mut bulk = self.lock_bulk();
        if bulk.open {
            bulk.staged[id.0] = Some(value);
        } else {
            drop(bulk);
            self.slots[id.0].publish(value, ramp_seconds);
        }
        Ok(())
    }

    fn set_immediate(&self, name: &str, value: f32) -> Result<()> {
        let id = self.lookup(name)?;
        if !value.is_finite() {
            return Err(DspError::NonFiniteValue(name.to_string()));
        }
        let slot = &self.slots[id.0];
        slot.current.store(value);
        slot.active.store(false, Ordering::Relaxed);
        slot.publish(value, 0.0);
        Ok(())
    }

    fn begin_bulk_transition(&self, ramp_seconds: f32) {
        let mut bulk = self.lock_bulk();
        bulk.open = true;
        bulk.ramp_seconds = ramp_seconds.max(0.0);
        bulk.staged.clear();
        bulk.staged.resize(self.slots.len(), None);
    }

    fn end_bulk_transition(&self) {
        let mut bulk = self.lock_bulk();
        if !bulk.open {
            return;
        }
        let ramp_seconds = bulk.ramp_seconds;

        self.epoch.fetch_add(1, Ordering::Acquire);
        fence(Ordering::Release);
        for (slot, staged) in self.slots.iter().zip(bulk.staged.iter()) {
            if let Some(target) = staged {
                slot.publish(*target, ramp_seconds);
            }
        }
        self.epoch.fetch_add(1, Ordering::Release);

        bulk.open = false;
        bulk.staged.clear();
    }

    fn is_bulk_open(&self) -> bool {
        self.lock_bulk().open
    }

    fn is_smoothing(&self, id: ParamId) -> bool {
        let slot = &self.slots[id.0];
        slot.active.load(Ordering::Relaxed)
            || slot.seq.load(Ordering::Acquire) != slot.applied_seq.load(Ordering::Acquire)
    }
}

/// Control-thread handle to a [`SmoothedParameterSet`]
///
/// Cheap to clone and safe to use from any number of threads. Target writes
/// take effect at the next audio block.
#[derive(Debug, Clone)]
pub struct SmootherHandle {
    bus: Arc<SmoothingBus>,
}

impl SmootherHandle {
    /// Glide `name` to `value` over `ramp_seconds`
    pub fn set_target(&self, name: &str, value: f32, ramp_seconds: f32) -> Result<()> {
        self.bus.set_target(name, value, ramp_seconds)
    }

    /// Jump `name` to `value`; for initialisation and state restore
    pub fn set_immediate(&self, name: &str, value: f32) -> Result<()> {
        self.bus.set_immediate(name, value)
    }

    /// Start staging targets that will be released together
    pub fn begin_bulk_transition(&self, ramp_seconds: f32) {
        self.bus.begin_bulk_transition(ramp_seconds);
    }

    /// Set several targets at once
    ///
    /// Inside an open bulk transition the targets are staged; otherwise they
    /// are released together with the bulk ramp.
    pub fn set_all_targets<'a, I>(&self, targets: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        let implicit = !self.bus.is_bulk_open();
        if implicit {
            self.bus.begin_bulk_transition(BULK_RAMP_SECONDS);
        }
        let result = targets
            .into_iter()
            .try_for_each(|(name, value)| self.bus.set_target(name, value, BULK_RAMP_SECONDS));
        if implicit {
            self.bus.end_bulk_transition();
        }
        result
    }

    /// Release every staged target in the same block
    pub fn end_bulk_transition(&self) {
        self.bus.end_bulk_transition();
    }

    /// Value as of the last processed block
    pub fn current_value(&self, name: &str) -> Result<f32> {
        let id = self.bus.lookup(name)?;
        Ok(self.bus.slots[id.0].current.load())
    }

    /// Whether `name` is still moving or has a target not yet picked up
    pub fn is_smoothing(&self, name: &str) -> Result<bool> {
        let id = self.bus.lookup(name)?;
        Ok(self.bus.is_smoothing(id))
    }

    /// Whether any parameter is still moving
    pub fn is_any_smoothing(&self) -> bool {
        (0..self.bus.slots.len()).any(|i| self.bus.is_smoothing(ParamId(i)))
    }

    /// Registered parameter names
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.bus.slots.iter().map(|s| s.name.as_str())
    }
}

/// Audio-thread owner of a set of smoothed parameters
#[derive(Debug)]
pub struct SmoothedParameterSet {
    bus: Arc<SmoothingBus>,
    ramps: Vec<LinearRamp>,
    applied: Vec<u32>,
    /// Last command each ramp was started from
    applied_command: Vec<u64>,
    pickup: Vec<Option<(u32, u64)>>,
    sample_rate: f32,
}

impl SmoothedParameterSet {
    pub fn new() -> Self {
        Self {
            bus: Arc::new(SmoothingBus {
                slots: Vec::new(),
                index: HashMap::new(),
                epoch: AtomicU32::new(0),
                bulk: Mutex::new(BulkState::default()),
            }),
            ramps: Vec::new(),
            applied: Vec::new(),
            applied_command: Vec::new(),
            pickup: Vec::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Register a parameter
    ///
    /// Registration must finish before the first [`handle`](Self::handle) is
    /// taken. Duplicate names are rejected and leave the existing parameter
    /// untouched.
    pub fn add_parameter(&mut self, name: &str, initial: f32) -> Result<ParamId> {
        let bus = Arc::get_mut(&mut self.bus)
            .ok_or_else(|| DspError::ParametersShared(name.to_string()))?;
        if bus.index.contains_key(name) {
            return Err(DspError::DuplicateParameter(name.to_string()));
        }
        if !initial.is_finite() {
            return Err(DspError::NonFiniteValue(name.to_string()));
        }

        let id = ParamId(bus.slots.len());
        bus.slots.push(Slot::new(name.to_string(), initial));
        bus.index.insert(name.to_string(), id);

        self.ramps.push(LinearRamp::new(initial));
        self.applied.push(0);
        self.applied_command.push(pack(initial, 0.0));
        self.pickup.push(None);
        Ok(id)
    }

    /// Control-side handle sharing this set's bus
    pub fn handle(&self) -> SmootherHandle {
        SmootherHandle {
            bus: Arc::clone(&self.bus),
        }
    }

    /// Set the rate used to convert ramp seconds into samples
    pub fn prepare(&mut self, sample_rate: f32) {
        if sample_rate.is_finite() && sample_rate > 0.0 {
            self.sample_rate = sample_rate;
        }
    }

    /// Look up a parameter id
    pub fn id(&self, name: &str) -> Result<ParamId> {
        self.bus.lookup(name)
    }

    pub fn set_target(&self, name: &str, value: f32, ramp_seconds: f32) -> Result<()> {
        self.bus.set_target(name, value, ramp_seconds)
    }

    /// Jump to a value; applied to the audio-side ramp right away
    pub fn set_immediate(&mut self, name: &str, value: f32) -> Result<()> {
        self.bus.set_immediate(name, value)?;
        self.pick_up_commands();
        Ok(())
    }

    pub fn begin_bulk_transition(&self, ramp_seconds: f32) {
        self.bus.begin_bulk_transition(ramp_seconds);
    }

    pub fn set_all_targets<'a, I>(&self, targets: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        self.handle().set_all_targets(targets)
    }

    pub fn end_bulk_transition(&self) {
        self.bus.end_bulk_transition();
    }

    /// Advance every ramp by one block
    ///
    /// Called exactly once per block on the audio thread. New targets are
    /// picked up first, then every active ramp moves by `num_samples`.
    pub fn advance(&mut self, num_samples: usize) {
        self.pick_up_commands();

        let samples = num_samples.min(u32::MAX as usize) as u32;
        for (ramp, slot) in self.ramps.iter_mut().zip(self.bus.slots.iter()) {
            let was_active = ramp.is_active();
            let value = ramp.advance(samples);
            if was_active {
                slot.current.store(value);
                slot.active.store(ramp.is_active(), Ordering::Relaxed);
            }
        }
    }

    /// Interpolated value by id (no lookup)
    #[inline]
    pub fn value(&self, id: ParamId) -> f32 {
        self.ramps[id.0].current()
    }

    /// Direct access to a ramp for per-sample stepping
    #[inline]
    pub fn ramp_mut(&mut self, id: ParamId) -> &mut LinearRamp {
        &mut self.ramps[id.0]
    }

    pub fn current_value(&self, name: &str) -> Result<f32> {
        Ok(self.value(self.bus.lookup(name)?))
    }

    pub fn target_value(&self, name: &str) -> Result<f32> {
        Ok(self.ramps[self.bus.lookup(name)?.0].target())
    }

    pub fn is_smoothing(&self, name: &str) -> Result<bool> {
        let id = self.bus.lookup(name)?;
        Ok(self.ramps[id.0].is_active() || self.bus.is_smoothing(id))
    }

    pub fn is_any_smoothing(&self) -> bool {
        self.ramps.iter().any(LinearRamp::is_active)
            || (0..self.ramps.len()).any(|i| self.bus.is_smoothing(ParamId(i)))
    }

    /// Snap every ramp onto its target
    pub fn reset(&mut self) {
        for (ramp, slot) in self.ramps.iter_mut().zip(self.bus.slots.iter()) {
            ramp.set_immediate(ramp.target());
            slot.current.store(ramp.current());
            slot.active.store(false, Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.ramps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ramps.is_empty()
    }

    /// Apply every command published since the last pickup
    ///
    /// Skipped entirely (retried next block) when a bulk publish overlapped
    /// the read. A command equal to the one a ramp is already heading for is
    /// not applied again.
    fn pick_up_commands(&mut self) {
        let stamp = self.bus.epoch.load(Ordering::Acquire);
        if stamp & 1 == 1 {
            return;
        }

        let mut any = false;
        for ((slot, applied), pending) in self
            .bus
            .slots
            .iter()
            .zip(self.applied.iter())
            .zip(self.pickup.iter_mut())
        {
            let seq = slot.seq.load(Ordering::Acquire);
            *pending = if seq == *applied {
                None
            } else {
                any = true;
                Some((seq, slot.command.load(Ordering::Acquire)))
            };
        }
        if !any {
            return;
        }

        fence(Ordering::Acquire);
        if self.bus.epoch.load(Ordering::Relaxed) != stamp {
            return;
        }

        let sample_rate = self.sample_rate;
        for (i, pending) in self.pickup.iter_mut().enumerate() {
            if let Some((seq, command)) = pending.take() {
                let (target, ramp_seconds) = unpack(command);
                let ramp = &mut self.ramps[i];
                let repeated = command == self.applied_command[i]
                    && target.to_bits() == ramp.target().to_bits();
                if !repeated {
                    let samples = (ramp_seconds * sample_rate).round() as u32;
                    ramp.set_target(target, samples);
                    self.applied_command[i] = command;
                }

                let slot = &self.bus.slots[i];
                slot.current.store(ramp.current());
                slot.active.store(ramp.is_active(), Ordering::Relaxed);
                slot.applied_seq.store(seq, Ordering::Release);
                self.applied[i] = seq;
            }
        }
    }
}

impl Default for SmoothedParameterSet {
    fn default() -> Self {
        Self::new()
    }
}
