//! Analysis helpers for verifying processed audio

/// RMS level
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Largest absolute sample
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max)
}

/// Convert linear amplitude to dB (silence floors at -100 dB)
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        -100.0
    } else {
        20.0 * linear.log10()
    }
}

/// Ratio of first-difference RMS to signal RMS
///
/// A first difference is a +6 dB/octave tilt, so the ratio grows with the
/// share of high-frequency (broadband) energy. Silence yields 0.
pub fn brightness(samples: &[f32]) -> f32 {
    let level = rms(samples);
    if level <= f32::EPSILON || samples.len() < 2 {
        return 0.0;
    }
    let diff: Vec<f32> = samples.windows(2).map(|w| w[1] - w[0]).collect();
    rms(&diff) / level
}

/// Whether every sample is finite
pub fn all_finite(samples: &[f32]) -> bool {
    samples.iter().all(|s| s.is_finite())
}

/// Largest sample-to-sample jump
pub fn max_step(samples: &[f32]) -> f32 {
    samples
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brightness_rises_with_frequency() {
        let tone = |freq: f32| -> Vec<f32> {
            (0..4800)
                .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / 48_000.0).sin())
                .collect()
        };
        assert!(brightness(&tone(2000.0)) > brightness(&tone(200.0)) * 5.0);
        assert_eq!(brightness(&[0.0; 16]), 0.0);
    }

    #[test]
    fn rms_of_sine() {
        let sine: Vec<f32> = (0..48_000)
            .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 48_000.0).sin())
            .collect();
        assert!((rms(&sine) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
        assert!((peak(&sine) - 1.0).abs() < 1e-3);
    }
}
