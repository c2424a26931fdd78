//! Integer-factor oversampling around a nonlinearity
//!
//! Zero-stuffing interpolation followed by a 4th-order Butterworth
//! anti-imaging filter, the shaping function at the raised rate, then a
//! matching anti-aliasing filter and decimation. One instance per channel.

use super::filters::{Biquad, BiquadCoefficients};

/// Q values of a 4th-order Butterworth split into two biquads
const BUTTERWORTH_Q: [f32; 2] = [0.541_196_1, 1.306_563];

#[derive(Debug, Clone)]
pub struct Oversampler {
    factor: usize,
    up: [Biquad; 2],
    down: [Biquad; 2],
}

impl Oversampler {
    pub fn new() -> Self {
        Self {
            factor: 1,
            up: Default::default(),
            down: Default::default(),
        }
    }

    /// Configure for a base sample rate and factor (snapped to 1, 2 or 4)
    pub fn prepare(&mut self, sample_rate: f32, factor: u32) {
        self.factor = match factor {
            0 | 1 => 1,
            2 | 3 => 2,
            _ => 4,
        };
        let raised_rate = sample_rate * self.factor as f32;
        let cutoff = sample_rate * 0.45;
        for (stage, q) in BUTTERWORTH_Q.iter().enumerate() {
            let coeffs = BiquadCoefficients::low_pass(raised_rate, cutoff, *q);
            self.up[stage] = Biquad::new(coeffs);
            self.down[stage] = Biquad::new(coeffs);
        }
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Run one base-rate sample through `shaper` at the raised rate
    #[inline]
    pub fn process(&mut self, input: f32, mut shaper: impl FnMut(f32) -> f32) -> f32 {
        if self.factor == 1 {
            return shaper(input);
        }

        let mut output = 0.0;
        for k in 0..self.factor {
            let stuffed = if k == 0 {
                input * self.factor as f32
            } else {
                0.0
            };
            let first = self.up[0].process(stuffed);
            let interpolated = self.up[1].process(first);
            let shaped = shaper(interpolated);
            let band_limited = self.down[0].process(shaped);
            output = self.down[1].process(band_limited);
        }
        output
    }

    pub fn reset(&mut self) {
        for filter in self.up.iter_mut().chain(self.down.iter_mut()) {
            filter.reset();
        }
    }
}

impl Default for Oversampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn factor_snaps_to_supported_values() {
        let mut os = Oversampler::new();
        for (requested, expected) in [(0, 1), (1, 1), (2, 2), (3, 2), (4, 4), (8, 4)] {
            os.prepare(48_000.0, requested);
            assert_eq!(os.factor(), expected);
        }
    }

    #[test]
    fn linear_path_preserves_low_frequency_level() {
        for factor in [2, 4] {
            let mut os = Oversampler::new();
            os.prepare(48_000.0, factor);
            let mut peak: f32 = 0.0;
            for i in 0..48_000 {
                let x = (2.0 * PI * 200.0 * i as f32 / 48_000.0).sin() * 0.5;
                let y = os.process(x, |s| s);
                if i > 24_000 {
                    peak = peak.max(y.abs());
                }
            }
            assert!((peak - 0.5).abs() < 0.03, "factor {} peak {}", factor, peak);
        }
    }

    #[test]
    fn unity_factor_is_direct() {
        let mut os = Oversampler::new();
        os.prepare(44_100.0, 1);
        assert_eq!(os.process(0.3, |s| s * 2.0), 0.6);
    }
}
