//! Valid ranges and defaults for every preset parameter
//!
//! The DSP units declare their atomic parameters from these constants, so a
//! value that passes `PresetData::clamp_to_valid_ranges` is always accepted
//! verbatim by the engine.

/// Inclusive parameter range with a default value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    /// Lower bound
    pub min: f32,
    /// Upper bound
    pub max: f32,
    /// Value used when nothing else is specified (and for NaN input)
    pub default: f32,
}

impl ParamRange {
    /// Declare a range
    pub const fn new(min: f32, max: f32, default: f32) -> Self {
        Self { min, max, default }
    }

    /// Clamp into range; NaN maps to the default
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }

    /// Check whether a value lies inside the range
    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Map a normalized 0..1 position onto the range
    #[inline]
    pub fn denormalize(&self, position: f32) -> f32 {
        self.min + position.clamp(0.0, 1.0) * (self.max - self.min)
    }
}

pub mod noise_gate {
    use super::ParamRange;

    pub const THRESHOLD_DB: ParamRange = ParamRange::new(-90.0, 0.0, -55.0);
    pub const ATTACK_MS: ParamRange = ParamRange::new(0.1, 50.0, 1.0);
    pub const HOLD_MS: ParamRange = ParamRange::new(0.0, 100.0, 10.0);
    pub const RELEASE_MS: ParamRange = ParamRange::new(5.0, 500.0, 100.0);
    pub const LOOKAHEAD_MS: ParamRange = ParamRange::new(0.0, 5.0, 0.0);
    pub const HYSTERESIS_DB: ParamRange = ParamRange::new(0.0, 10.0, 3.0);
    pub const RHYTHM_RATE_HZ: ParamRange = ParamRange::new(0.1, 10.0, 4.0);
    pub const RHYTHM_DEPTH: ParamRange = ParamRange::new(0.0, 1.0, 1.0);
}

pub mod compressor {
    use super::ParamRange;

    pub const RATIO: ParamRange = ParamRange::new(1.0, 10.0, 3.0);
    pub const THRESHOLD_DB: ParamRange = ParamRange::new(-60.0, 0.0, -18.0);
    pub const ATTACK_MS: ParamRange = ParamRange::new(0.1, 50.0, 10.0);
    pub const RELEASE_MS: ParamRange = ParamRange::new(10.0, 500.0, 60.0);
    pub const MAKEUP_DB: ParamRange = ParamRange::new(-12.0, 12.0, 2.0);
    pub const KNEE: ParamRange = ParamRange::new(0.0, 1.0, 0.5);
    pub const LOOKAHEAD_MS: ParamRange = ParamRange::new(0.0, 10.0, 0.0);
    pub const MIX: ParamRange = ParamRange::new(0.0, 1.0, 1.0);
}

pub mod drive {
    use super::ParamRange;

    pub const DRIVE: ParamRange = ParamRange::new(0.0, 1.0, 0.6);
    pub const TONE: ParamRange = ParamRange::new(0.0, 1.0, 0.55);
    pub const LEVEL: ParamRange = ParamRange::new(0.0, 2.0, 1.0);
}

pub mod amp {
    use super::ParamRange;

    pub const GAIN: ParamRange = ParamRange::new(0.0, 1.0, 0.45);
    pub const BASS: ParamRange = ParamRange::new(0.0, 1.0, 0.48);
    pub const MID: ParamRange = ParamRange::new(0.0, 1.0, 0.35);
    pub const TREBLE: ParamRange = ParamRange::new(0.0, 1.0, 0.62);
    pub const PRESENCE: ParamRange = ParamRange::new(0.0, 1.0, 0.52);
    pub const MASTER: ParamRange = ParamRange::new(0.0, 1.0, 0.7);
}

pub mod cabinet {
    use super::ParamRange;

    pub const LOW_CUT_HZ: ParamRange = ParamRange::new(20.0, 200.0, 70.0);
    pub const HIGH_CUT_HZ: ParamRange = ParamRange::new(3000.0, 12000.0, 8000.0);
    pub const MIC_POSITION: ParamRange = ParamRange::new(0.0, 1.0, 0.5);
    pub const ROOM: ParamRange = ParamRange::new(0.0, 1.0, 0.1);
    pub const IR_LENGTH_MS: ParamRange = ParamRange::new(10.0, 500.0, 100.0);
}

pub mod chorus {
    use super::ParamRange;

    pub const RATE_HZ: ParamRange = ParamRange::new(0.05, 5.0, 0.3);
    pub const DEPTH: ParamRange = ParamRange::new(0.0, 1.0, 0.35);
    pub const MIX: ParamRange = ParamRange::new(0.0, 1.0, 0.25);
    pub const FEEDBACK: ParamRange = ParamRange::new(-0.95, 0.95, 0.0);
    pub const BASE_DELAY_MS: ParamRange = ParamRange::new(1.0, 50.0, 7.0);
    pub const SPREAD: ParamRange = ParamRange::new(0.0, 1.0, 0.5);
}

pub mod delay {
    use super::ParamRange;

    pub const TIME_MS: ParamRange = ParamRange::new(40.0, 1200.0, 420.0);
    pub const FEEDBACK: ParamRange = ParamRange::new(0.0, 0.95, 0.35);
    pub const MIX: ParamRange = ParamRange::new(0.0, 1.0, 0.2);
    pub const MOD_RATE_HZ: ParamRange = ParamRange::new(0.0, 2.0, 0.3);
    pub const MOD_DEPTH: ParamRange = ParamRange::new(0.0, 1.0, 0.1);
    pub const HIGH_CUT_HZ: ParamRange = ParamRange::new(1000.0, 20000.0, 8000.0);
    pub const LOW_CUT_HZ: ParamRange = ParamRange::new(20.0, 500.0, 80.0);
    pub const SPREAD: ParamRange = ParamRange::new(0.0, 1.0, 0.0);
    pub const DIFFUSION: ParamRange = ParamRange::new(0.0, 1.0, 0.0);

    /// Longest delay the ring buffer is sized for, in seconds
    pub const MAX_SECONDS: f32 = 2.0;
}

pub mod reverb {
    use super::ParamRange;

    pub const PRE_DELAY_MS: ParamRange = ParamRange::new(0.0, 60.0, 12.0);
    pub const DECAY_S: ParamRange = ParamRange::new(0.2, 12.0, 4.5);
    pub const DAMPING: ParamRange = ParamRange::new(0.0, 1.0, 0.35);
    pub const MIX: ParamRange = ParamRange::new(0.0, 1.0, 0.28);
    pub const MOD_RATE_HZ: ParamRange = ParamRange::new(0.1, 5.0, 0.5);
    pub const MOD_DEPTH: ParamRange = ParamRange::new(0.0, 1.0, 0.2);
    pub const SHIMMER_PITCH: ParamRange = ParamRange::new(-12.0, 12.0, 12.0);
    pub const SHIMMER_MIX: ParamRange = ParamRange::new(0.0, 1.0, 0.3);
}

pub mod eq {
    use super::ParamRange;

    pub const LOW_FREQ_HZ: ParamRange = ParamRange::new(60.0, 200.0, 120.0);
    pub const LOW_GAIN_DB: ParamRange = ParamRange::new(-12.0, 12.0, 1.5);
    pub const MID_FREQ_HZ: ParamRange = ParamRange::new(300.0, 3000.0, 1200.0);
    pub const MID_Q: ParamRange = ParamRange::new(0.3, 4.0, 0.9);
    pub const MID_GAIN_DB: ParamRange = ParamRange::new(-12.0, 12.0, -1.0);
    pub const HIGH_FREQ_HZ: ParamRange = ParamRange::new(4000.0, 10000.0, 6000.0);
    pub const HIGH_GAIN_DB: ParamRange = ParamRange::new(-12.0, 12.0, 1.0);
    pub const SHELF_Q: ParamRange = ParamRange::new(0.3, 2.0, 0.707);
    pub const TILT: ParamRange = ParamRange::new(-1.0, 1.0, 0.0);
}

/// Chain-level controls that sit outside any preset block
pub mod chain {
    use super::ParamRange;

    pub const GAIN: ParamRange = ParamRange::new(0.0, 2.0, 1.0);
    pub const TONE: ParamRange = ParamRange::new(0.0, 1.0, 0.5);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_pins_to_bounds() {
        let range = ParamRange::new(-12.0, 12.0, 0.0);
        assert_eq!(range.clamp(20.0), 12.0);
        assert_eq!(range.clamp(-20.0), -12.0);
        assert_eq!(range.clamp(3.5), 3.5);
    }

    #[test]
    fn nan_maps_to_default() {
        assert_eq!(delay::TIME_MS.clamp(f32::NAN), 420.0);
    }

    #[test]
    fn defaults_lie_inside_their_ranges() {
        let all = [
            noise_gate::THRESHOLD_DB,
            noise_gate::HYSTERESIS_DB,
            compressor::RATIO,
            compressor::MAKEUP_DB,
            drive::TONE,
            amp::MASTER,
            cabinet::HIGH_CUT_HZ,
            chorus::FEEDBACK,
            delay::HIGH_CUT_HZ,
            reverb::DECAY_S,
            eq::SHELF_Q,
            chain::GAIN,
        ];
        for range in all {
            assert!(range.contains(range.default), "{:?}", range);
        }
    }

    #[test]
    fn denormalize_spans_range() {
        assert_eq!(chain::GAIN.denormalize(0.0), 0.0);
        assert_eq!(chain::GAIN.denormalize(1.0), 2.0);
        assert_eq!(chain::GAIN.denormalize(0.5), 1.0);
    }
}
