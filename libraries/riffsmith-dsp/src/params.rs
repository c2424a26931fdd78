//! Lock-free parameter storage shared between control threads and the audio thread
//!
//! Every value is an independent atomic accessed with `Relaxed` ordering: the
//! audio thread reads each one once per block and never needs a consistent
//! snapshot across parameters.

use riffsmith_core::{
    AmpModel, CabinetIr, ChorusWaveform, DetectorMode, DriveType, GateMode, ParamRange,
    ReverbAlgorithm,
};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Minimum change that triggers a coefficient recompute
pub const CHANGE_TOLERANCE: f32 = 1e-3;

/// f32 stored as its bit pattern in an `AtomicU32`
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Named, range-checked atomic parameter
///
/// `set` clamps before the store, so readers never observe an out-of-range
/// value.
#[derive(Debug)]
pub struct Parameter {
    name: &'static str,
    range: ParamRange,
    value: AtomicF32,
}

impl Parameter {
    /// Declare a parameter initialised to its range default
    pub fn new(name: &'static str, range: ParamRange) -> Self {
        Self {
            name,
            range,
            value: AtomicF32::new(range.default),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load()
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.value.store(self.range.clamp(value));
    }

    /// Restore the default value
    pub fn reset(&self) {
        self.value.store(self.range.default);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn range(&self) -> ParamRange {
        self.range
    }
}

/// Closed set of values that can live in an [`AtomicChoice`]
pub trait Choice: Copy + PartialEq + 'static {
    /// Every variant; index 0 is the fallback
    const VARIANTS: &'static [Self];
}

/// Enum parameter stored as its variant index
#[derive(Debug)]
pub struct AtomicChoice<T: Choice> {
    index: AtomicU8,
    _marker: PhantomData<T>,
}

impl<T: Choice> AtomicChoice<T> {
    pub fn new(value: T) -> Self {
        Self {
            index: AtomicU8::new(Self::index_of(value)),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn load(&self) -> T {
        let index = self.index.load(Ordering::Relaxed) as usize;
        T::VARIANTS
            .get(index)
            .copied()
            .unwrap_or(T::VARIANTS[0])
    }

    #[inline]
    pub fn store(&self, value: T) {
        self.index.store(Self::index_of(value), Ordering::Relaxed);
    }

    /// Variant index, used as a change-tracking key
    #[inline]
    pub fn load_index(&self) -> u8 {
        self.index.load(Ordering::Relaxed)
    }

    fn index_of(value: T) -> u8 {
        T::VARIANTS
            .iter()
            .position(|v| *v == value)
            .unwrap_or(0) as u8
    }
}

impl Choice for DriveType {
    const VARIANTS: &'static [Self] = &[
        DriveType::SoftClip,
        DriveType::HardClip,
        DriveType::Tube,
        DriveType::Fuzz,
    ];
}

impl Choice for AmpModel {
    const VARIANTS: &'static [Self] = &[
        AmpModel::CleanBlackface,
        AmpModel::JanglyVox,
        AmpModel::BritCrunch,
        AmpModel::HiGain,
    ];
}

impl Choice for CabinetIr {
    const VARIANTS: &'static [Self] = &[
        CabinetIr::OneByTwelveOpen,
        CabinetIr::TwoByTwelveOpen,
        CabinetIr::FourByTwelveClosed,
    ];
}

impl Choice for ChorusWaveform {
    const VARIANTS: &'static [Self] = &[
        ChorusWaveform::Sine,
        ChorusWaveform::Triangle,
        ChorusWaveform::Saw,
        ChorusWaveform::Square,
    ];
}

impl Choice for ReverbAlgorithm {
    const VARIANTS: &'static [Self] = &[
        ReverbAlgorithm::Room,
        ReverbAlgorithm::Plate,
        ReverbAlgorithm::Hall,
        ReverbAlgorithm::Shimmer,
    ];
}

impl Choice for DetectorMode {
    const VARIANTS: &'static [Self] = &[DetectorMode::Peak, DetectorMode::Rms];
}

impl Choice for GateMode {
    const VARIANTS: &'static [Self] = &[GateMode::Normal, GateMode::Ducking, GateMode::Rhythmic];
}

/// Remembers the values coefficients were last computed from
///
/// `update` reports a change only when some value moved by more than
/// [`CHANGE_TOLERANCE`] since the last reported change, so slow drifts still
/// accumulate into a recompute.
#[derive(Debug, Clone)]
pub struct ChangeTracker<const N: usize> {
    last: [f32; N],
    primed: bool,
}

impl<const N: usize> ChangeTracker<N> {
    pub fn new() -> Self {
        Self {
            last: [0.0; N],
            primed: false,
        }
    }

    /// Returns true (and remembers `current`) when a recompute is due
    #[inline]
    pub fn update(&mut self, current: [f32; N]) -> bool {
        let changed = !self.primed
            || self
                .last
                .iter()
                .zip(current.iter())
                .any(|(a, b)| (a - b).abs() > CHANGE_TOLERANCE);
        if changed {
            self.last = current;
            self.primed = true;
        }
        changed
    }

    /// Force the next `update` to report a change
    pub fn invalidate(&mut self) {
        self.primed = false;
    }
}

impl<const N: usize> Default for ChangeTracker<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riffsmith_core::ranges;

    #[test]
    fn parameter_clamps_on_set() {
        let p = Parameter::new("mix", ranges::delay::MIX);
        p.set(3.0);
        assert_eq!(p.get(), 1.0);
        p.set(-3.0);
        assert_eq!(p.get(), 0.0);
        p.set(f32::NAN);
        assert_eq!(p.get(), ranges::delay::MIX.default);
    }

    #[test]
    fn parameter_reset_restores_default() {
        let p = Parameter::new("time", ranges::delay::TIME_MS);
        p.set(100.0);
        p.reset();
        assert_eq!(p.get(), 420.0);
    }

    #[test]
    fn atomic_choice_roundtrips_every_variant() {
        let choice = AtomicChoice::new(DriveType::SoftClip);
        for &variant in DriveType::VARIANTS {
            choice.store(variant);
            assert_eq!(choice.load(), variant);
        }
    }

    #[test]
    fn change_tracker_ignores_tiny_moves() {
        let mut tracker = ChangeTracker::<2>::new();
        assert!(tracker.update([0.5, 1.0]), "first update always recomputes");
        assert!(!tracker.update([0.5005, 1.0]));
        assert!(tracker.update([0.502, 1.0]));
    }

    #[test]
    fn change_tracker_accumulates_slow_drift() {
        let mut tracker = ChangeTracker::<1>::new();
        tracker.update([0.0]);
        let mut value = 0.0;
        let mut recomputes = 0;
        for _ in 0..10 {
            value += 0.0004;
            if tracker.update([value]) {
                recomputes += 1;
            }
        }
        assert!(recomputes >= 1, "drift of 0.004 must eventually recompute");
    }

    #[test]
    fn invalidate_forces_recompute() {
        let mut tracker = ChangeTracker::<1>::new();
        tracker.update([1.0]);
        assert!(!tracker.update([1.0]));
        tracker.invalidate();
        assert!(tracker.update([1.0]));
    }
}
