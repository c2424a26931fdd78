//! IIR filter building blocks
//!
//! RBJ cookbook biquads (single channel, direct form I) and simple
//! one-pole sections. Coefficients are computed off the per-sample path and
//! swapped in between blocks; filter history survives coefficient changes.

use std::f32::consts::PI;

/// Normalised biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

/// Keep design frequencies clear of Nyquist
#[inline]
fn clamp_frequency(frequency: f32, sample_rate: f32) -> f32 {
    frequency.clamp(1.0, sample_rate * 0.45)
}

impl BiquadCoefficients {
    /// Pass-through
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    fn omega(sample_rate: f32, frequency: f32) -> (f32, f32) {
        let omega = 2.0 * PI * clamp_frequency(frequency, sample_rate) / sample_rate;
        (omega.sin(), omega.cos())
    }

    pub fn low_pass(sample_rate: f32, frequency: f32, q: f32) -> Self {
        if sample_rate < 1.0 {
            return Self::IDENTITY;
        }
        let (sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let alpha = sin_w / (2.0 * q.max(0.01));
        Self::normalized(
            (1.0 - cos_w) / 2.0,
            1.0 - cos_w,
            (1.0 - cos_w) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }

    pub fn high_pass(sample_rate: f32, frequency: f32, q: f32) -> Self {
        if sample_rate < 1.0 {
            return Self::IDENTITY;
        }
        let (sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let alpha = sin_w / (2.0 * q.max(0.01));
        Self::normalized(
            (1.0 + cos_w) / 2.0,
            -(1.0 + cos_w),
            (1.0 + cos_w) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }

    pub fn band_pass(sample_rate: f32, frequency: f32, q: f32) -> Self {
        if sample_rate < 1.0 {
            return Self::IDENTITY;
        }
        let (sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let alpha = sin_w / (2.0 * q.max(0.01));
        Self::normalized(alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w, 1.0 - alpha)
    }

    pub fn all_pass(sample_rate: f32, frequency: f32, q: f32) -> Self {
        if sample_rate < 1.0 {
            return Self::IDENTITY;
        }
        let (sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let alpha = sin_w / (2.0 * q.max(0.01));
        Self::normalized(
            1.0 - alpha,
            -2.0 * cos_w,
            1.0 + alpha,
            1.0 + alpha,
            -2.0 * cos_w,
            1.0 - alpha,
        )
    }

    pub fn peaking(sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Self {
        if sample_rate < 1.0 {
            return Self::IDENTITY;
        }
        let a = 10.0_f32.powf(gain_db / 40.0);
        let (sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let alpha = sin_w / (2.0 * q.max(0.01));
        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w,
            1.0 - alpha / a,
        )
    }

    pub fn low_shelf(sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Self {
        if sample_rate < 1.0 {
            return Self::IDENTITY;
        }
        let a = 10.0_f32.powf(gain_db / 40.0);
        let (sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let alpha = sin_w / (2.0 * q.max(0.01));
        let beta = 2.0 * a.sqrt() * alpha;
        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * cos_w + beta),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w),
            a * ((a + 1.0) - (a - 1.0) * cos_w - beta),
            (a + 1.0) + (a - 1.0) * cos_w + beta,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_w),
            (a + 1.0) + (a - 1.0) * cos_w - beta,
        )
    }

    pub fn high_shelf(sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Self {
        if sample_rate < 1.0 {
            return Self::IDENTITY;
        }
        let a = 10.0_f32.powf(gain_db / 40.0);
        let (sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let alpha = sin_w / (2.0 * q.max(0.01));
        let beta = 2.0 * a.sqrt() * alpha;
        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * cos_w + beta),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w),
            a * ((a + 1.0) + (a - 1.0) * cos_w - beta),
            (a + 1.0) - (a - 1.0) * cos_w + beta,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w),
            (a + 1.0) - (a - 1.0) * cos_w - beta,
        )
    }

    /// Magnitude response at `frequency`, linear
    pub fn magnitude_at(&self, frequency: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        let num = (num_re * num_re + num_im * num_im).sqrt();
        let den = (den_re * den_re + den_im * den_im).sqrt();
        if den > 0.0 {
            num / den
        } else {
            0.0
        }
    }
}

impl Default for BiquadCoefficients {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Single-channel biquad section
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coeffs: BiquadCoefficients,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoefficients) -> Self {
        Self {
            coeffs,
            ..Self::default()
        }
    }

    /// Swap coefficients, keeping history
    pub fn set_coefficients(&mut self, coeffs: BiquadCoefficients) {
        self.coeffs = coeffs;
    }

    pub fn coefficients(&self) -> BiquadCoefficients {
        self.coeffs
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let c = &self.coeffs;
        let mut out = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        // Flush denormals and anything non-finite
        if !out.is_finite() || out.abs() < 1e-15 {
            out = 0.0;
        }

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = out;
        out
    }

    /// Clear history, keep coefficients
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// One-pole low-pass: `y += a * (x - y)`
#[derive(Debug, Clone)]
pub struct OnePoleLowPass {
    a: f32,
    state: f32,
}

impl OnePoleLowPass {
    pub fn new() -> Self {
        Self { a: 1.0, state: 0.0 }
    }

    pub fn set_cutoff(&mut self, sample_rate: f32, frequency: f32) {
        let frequency = clamp_frequency(frequency, sample_rate);
        self.a = 1.0 - (-2.0 * PI * frequency / sample_rate).exp();
    }

    /// Set the raw feedback coefficient: 0 = no damping, 1 = frozen
    pub fn set_damping(&mut self, damping: f32) {
        self.a = 1.0 - damping.clamp(0.0, 0.999);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state += self.a * (input - self.state);
        if self.state.abs() < 1e-15 {
            self.state = 0.0;
        }
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

impl Default for OnePoleLowPass {
    fn default() -> Self {
        Self::new()
    }
}

/// DC blocker (one-pole high-pass at a few Hz)
#[derive(Debug, Clone, Default)]
pub struct DcBlocker {
    r: f32,
    x1: f32,
    y1: f32,
}

impl DcBlocker {
    pub fn new(sample_rate: f32) -> Self {
        let mut blocker = Self::default();
        blocker.prepare(sample_rate);
        blocker
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.r = 1.0 - (2.0 * PI * 10.0 / sample_rate.max(1.0));
        self.reset();
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = input - self.x1 + self.r * self.y1;
        self.x1 = input;
        self.y1 = if out.abs() < 1e-15 { 0.0 } else { out };
        self.y1
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms_after(filter: &mut Biquad, freq: f32, sample_rate: f32) -> f32 {
        let n = sample_rate as usize / 2;
        let mut sum = 0.0;
        let mut count = 0;
        for i in 0..n {
            let x = (2.0 * PI * freq * i as f32 / sample_rate).sin();
            let y = filter.process(x);
            if i > n / 2 {
                sum += y * y;
                count += 1;
            }
        }
        (sum / count as f32).sqrt()
    }

    #[test]
    fn low_pass_attenuates_highs() {
        let sr = 48_000.0;
        let mut lp = Biquad::new(BiquadCoefficients::low_pass(sr, 500.0, 0.707));
        let high = rms_after(&mut lp, 8000.0, sr);
        lp.reset();
        let low = rms_after(&mut lp, 100.0, sr);
        assert!(high < low * 0.05, "high {} low {}", high, low);
    }

    #[test]
    fn high_pass_attenuates_lows() {
        let sr = 48_000.0;
        let mut hp = Biquad::new(BiquadCoefficients::high_pass(sr, 2000.0, 0.707));
        let low = rms_after(&mut hp, 50.0, sr);
        assert!(low < 0.01, "low {}", low);
    }

    #[test]
    fn peaking_gain_matches_design_at_center() {
        let sr = 48_000.0;
        let coeffs = BiquadCoefficients::peaking(sr, 1000.0, 1.0, 6.0);
        let db = 20.0 * coeffs.magnitude_at(1000.0, sr).log10();
        assert!((db - 6.0).abs() < 0.1, "got {} dB", db);
    }

    #[test]
    fn shelves_reach_gain_far_from_corner() {
        let sr = 48_000.0;
        let low = BiquadCoefficients::low_shelf(sr, 200.0, 0.707, -9.0);
        let high = BiquadCoefficients::high_shelf(sr, 4000.0, 0.707, 9.0);
        assert!((20.0 * low.magnitude_at(20.0, sr).log10() + 9.0).abs() < 0.5);
        assert!((20.0 * high.magnitude_at(18_000.0, sr).log10() - 9.0).abs() < 0.5);
    }

    #[test]
    fn all_pass_has_unity_magnitude() {
        let sr = 44_100.0;
        let ap = BiquadCoefficients::all_pass(sr, 1200.0, 0.7);
        for f in [50.0, 500.0, 1200.0, 5000.0, 15000.0] {
            assert!((ap.magnitude_at(f, sr) - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn invalid_sample_rate_yields_identity() {
        assert_eq!(
            BiquadCoefficients::low_pass(0.0, 1000.0, 0.7),
            BiquadCoefficients::IDENTITY
        );
    }

    #[test]
    fn dc_blocker_removes_offset() {
        let mut dc = DcBlocker::new(48_000.0);
        let mut last = 1.0;
        for _ in 0..48_000 {
            last = dc.process(0.5);
        }
        assert!(last.abs() < 1e-3);
    }

    #[test]
    fn one_pole_converges_to_input() {
        let mut lp = OnePoleLowPass::new();
        lp.set_cutoff(48_000.0, 1000.0);
        let mut y = 0.0;
        for _ in 0..4800 {
            y = lp.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-3);
    }
}
