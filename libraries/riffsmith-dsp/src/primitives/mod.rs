//! DSP building blocks shared by the effect units

pub mod convolution;
pub mod delay_line;
pub mod filters;
pub mod lfo;
pub mod oversampler;
pub mod saturation;

pub use convolution::PartitionedConvolver;
pub use delay_line::{AllPassDelay, DelayLine};
pub use filters::{Biquad, BiquadCoefficients, DcBlocker, OnePoleLowPass};
pub use lfo::Lfo;
pub use oversampler::Oversampler;

/// Decibels to linear gain
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Linear gain to decibels, floored at -120 dB
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    if gain > 1e-6 {
        20.0 * gain.log10()
    } else {
        -120.0
    }
}

/// Equal-weight dry/wet blend with `mix` clamped to `[0, 1]`
#[inline]
pub fn mix_dry_wet(dry: f32, wet: f32, mix: f32) -> f32 {
    let mix = mix.clamp(0.0, 1.0);
    dry * (1.0 - mix) + wet * mix
}

/// Replace NaN/Inf with silence
#[inline]
pub fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_conversions_roundtrip() {
        assert!((db_to_gain(-6.0) - 0.501).abs() < 1e-3);
        assert!((gain_to_db(db_to_gain(-18.0)) + 18.0).abs() < 1e-4);
        assert_eq!(gain_to_db(0.0), -120.0);
    }

    #[test]
    fn mix_clamps() {
        assert_eq!(mix_dry_wet(1.0, 0.0, 2.0), 0.0);
        assert_eq!(mix_dry_wet(1.0, 0.0, -1.0), 1.0);
        assert_eq!(mix_dry_wet(1.0, 0.0, 0.25), 0.75);
    }
}
