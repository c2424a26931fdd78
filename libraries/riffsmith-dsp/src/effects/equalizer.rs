//! Three-band equalizer with tilt and optional analog saturation
//!
//! - Low shelf (60-200 Hz)
//! - Mid peaking band (300-3000 Hz)
//! - High shelf (4-10 kHz)
//! - Tilt: opposing ±6 dB shelves pivoting around 1 kHz

use super::unit::{EffectUnit, Lifecycle, UnitState};
use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::params::{ChangeTracker, Parameter};
use crate::primitives::{sanitize, Biquad, BiquadCoefficients};
use riffsmith_core::{ranges, BlockKind, EqParams};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pivot frequency of the tilt shelves
const TILT_PIVOT_HZ: f32 = 1000.0;

/// Shelf gain at full tilt
const TILT_MAX_DB: f32 = 6.0;

/// Drive into the analog stage; small values keep it subtle
const ANALOG_DRIVE: f32 = 0.5;

/// Rate used for response queries before `prepare`
const FALLBACK_SAMPLE_RATE: f32 = 48_000.0;

const NUM_SECTIONS: usize = 5;

#[derive(Debug)]
pub struct EqParameters {
    enabled: AtomicBool,
    pub low_freq_hz: Parameter,
    pub low_gain_db: Parameter,
    pub low_q: Parameter,
    pub mid_freq_hz: Parameter,
    pub mid_q: Parameter,
    pub mid_gain_db: Parameter,
    pub high_freq_hz: Parameter,
    pub high_gain_db: Parameter,
    pub high_q: Parameter,
    pub tilt: Parameter,
    analog: AtomicBool,
}

impl EqParameters {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            low_freq_hz: Parameter::new("low_freq_hz", ranges::eq::LOW_FREQ_HZ),
            low_gain_db: Parameter::new("low_gain_db", ranges::eq::LOW_GAIN_DB),
            low_q: Parameter::new("low_q", ranges::eq::SHELF_Q),
            mid_freq_hz: Parameter::new("mid_freq_hz", ranges::eq::MID_FREQ_HZ),
            mid_q: Parameter::new("mid_q", ranges::eq::MID_Q),
            mid_gain_db: Parameter::new("mid_gain_db", ranges::eq::MID_GAIN_DB),
            high_freq_hz: Parameter::new("high_freq_hz", ranges::eq::HIGH_FREQ_HZ),
            high_gain_db: Parameter::new("high_gain_db", ranges::eq::HIGH_GAIN_DB),
            high_q: Parameter::new("high_q", ranges::eq::SHELF_Q),
            tilt: Parameter::new("tilt", ranges::eq::TILT),
            analog: AtomicBool::new(false),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_analog(&self, analog: bool) {
        self.analog.store(analog, Ordering::Relaxed);
    }

    pub fn is_analog(&self) -> bool {
        self.analog.load(Ordering::Relaxed)
    }

    pub fn apply(&self, params: &EqParams) {
        self.low_freq_hz.set(params.low_freq_hz);
        self.low_gain_db.set(params.low_gain_db);
        self.low_q.set(params.low_q);
        self.mid_freq_hz.set(params.mid_freq_hz);
        self.mid_q.set(params.mid_q);
        self.mid_gain_db.set(params.mid_gain_db);
        self.high_freq_hz.set(params.high_freq_hz);
        self.high_gain_db.set(params.high_gain_db);
        self.high_q.set(params.high_q);
        self.tilt.set(params.tilt);
        self.set_analog(params.analog);
        self.set_enabled(params.enabled);
    }

    pub fn snapshot(&self) -> EqParams {
        EqParams {
            enabled: self.is_enabled(),
            low_freq_hz: self.low_freq_hz.get(),
            low_gain_db: self.low_gain_db.get(),
            low_q: self.low_q.get(),
            mid_freq_hz: self.mid_freq_hz.get(),
            mid_q: self.mid_q.get(),
            mid_gain_db: self.mid_gain_db.get(),
            high_freq_hz: self.high_freq_hz.get(),
            high_gain_db: self.high_gain_db.get(),
            high_q: self.high_q.get(),
            tilt: self.tilt.get(),
            analog: self.is_analog(),
        }
    }
}

impl Default for EqParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// Coefficients of every section, in processing order
fn design(params: &EqParams, sample_rate: f32) -> [BiquadCoefficients; NUM_SECTIONS] {
    let tilt_db = params.tilt * TILT_MAX_DB;
    [
        BiquadCoefficients::low_shelf(
            sample_rate,
            params.low_freq_hz,
            params.low_q,
            params.low_gain_db,
        ),
        BiquadCoefficients::peaking(
            sample_rate,
            params.mid_freq_hz,
            params.mid_q,
            params.mid_gain_db,
        ),
        BiquadCoefficients::high_shelf(
            sample_rate,
            params.high_freq_hz,
            params.high_q,
            params.high_gain_db,
        ),
        BiquadCoefficients::low_shelf(sample_rate, TILT_PIVOT_HZ, 0.707, -tilt_db),
        BiquadCoefficients::high_shelf(sample_rate, TILT_PIVOT_HZ, 0.707, tilt_db),
    ]
}

/// Magnitude response in dB of the EQ described by `params`
pub fn response_db(params: &EqParams, sample_rate: f32, frequency: f32) -> f32 {
    design(params, sample_rate)
        .iter()
        .map(|c| 20.0 * c.magnitude_at(frequency, sample_rate).max(1e-9).log10())
        .sum()
}

/// Equalizer stage
pub struct Equalizer {
    params: Arc<EqParameters>,
    lifecycle: Lifecycle,
    tracker: ChangeTracker<10>,
    sections: [[Biquad; NUM_SECTIONS]; 2],
}

impl Equalizer {
    pub fn new() -> Self {
        Self::with_parameters(Arc::new(EqParameters::new()))
    }

    pub fn with_parameters(params: Arc<EqParameters>) -> Self {
        Self {
            params,
            lifecycle: Lifecycle::new(),
            tracker: ChangeTracker::new(),
            sections: Default::default(),
        }
    }

    pub fn parameters(&self) -> Arc<EqParameters> {
        Arc::clone(&self.params)
    }

    pub fn apply_parameters(&self, params: &EqParams) {
        self.params.apply(params);
    }

    /// Magnitude response (dB) of the current settings at each frequency
    ///
    /// Control-side helper for drawing curves; allocates the result.
    pub fn frequency_response(&self, frequencies: &[f32]) -> Vec<f32> {
        let sample_rate = match self.lifecycle.sample_rate() {
            sr if sr > 0.0 => sr,
            _ => FALLBACK_SAMPLE_RATE,
        };
        let params = self.params.snapshot();
        frequencies
            .iter()
            .map(|&f| response_db(&params, sample_rate, f))
            .collect()
    }

    fn update_coefficients(&mut self, p: &EqParams) {
        if !self.tracker.update([
            p.low_freq_hz,
            p.low_gain_db,
            p.low_q,
            p.mid_freq_hz,
            p.mid_q,
            p.mid_gain_db,
            p.high_freq_hz,
            p.high_gain_db,
            p.high_q,
            p.tilt,
        ]) {
            return;
        }

        let coeffs = design(p, self.lifecycle.sample_rate());
        for channel in &mut self.sections {
            for (section, c) in channel.iter_mut().zip(coeffs.iter()) {
                section.set_coefficients(*c);
            }
        }
    }
}

impl Default for Equalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectUnit for Equalizer {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.lifecycle.prepare(self.name(), spec);
        self.tracker.invalidate();
        self.reset();
    }

    fn process_block(&mut self, buffer: &mut AudioBuffer) {
        if !self.lifecycle.is_prepared() || !self.params.is_enabled() {
            return;
        }

        let p = self.params.snapshot();
        self.update_coefficients(&p);

        for (channel, sections) in buffer.channels_mut().zip(self.sections.iter_mut()) {
            for sample in channel.iter_mut() {
                let mut x = *sample;
                for section in sections.iter_mut() {
                    x = section.process(x);
                }
                if p.analog {
                    x = (x * ANALOG_DRIVE).tanh() / ANALOG_DRIVE;
                }
                *sample = sanitize(x);
            }
        }
    }

    fn release(&mut self) {
        self.lifecycle.release(self.name());
    }

    fn reset(&mut self) {
        for section in self.sections.iter_mut().flatten() {
            section.reset();
        }
    }

    fn is_enabled(&self) -> bool {
        self.params.is_enabled()
    }

    fn state(&self) -> UnitState {
        self.lifecycle.state()
    }

    fn kind(&self) -> BlockKind {
        BlockKind::Eq
    }

    fn name(&self) -> &'static str {
        "Equalizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat() -> EqParams {
        EqParams {
            low_gain_db: 0.0,
            mid_gain_db: 0.0,
            high_gain_db: 0.0,
            tilt: 0.0,
            ..EqParams::default()
        }
    }

    #[test]
    fn flat_settings_have_flat_response() {
        for freq in [50.0, 200.0, 1000.0, 5000.0, 15000.0] {
            let db = response_db(&flat(), 48_000.0, freq);
            assert!(db.abs() < 0.01, "{freq} Hz: {db} dB");
        }
    }

    #[test]
    fn mid_boost_peaks_at_centre() {
        let params = EqParams {
            mid_freq_hz: 1000.0,
            mid_gain_db: 9.0,
            ..flat()
        };
        let centre = response_db(&params, 48_000.0, 1000.0);
        assert!((centre - 9.0).abs() < 0.1, "centre {centre}");
        assert!(response_db(&params, 48_000.0, 100.0) < 1.0);
    }

    #[test]
    fn positive_tilt_brightens() {
        let params = EqParams { tilt: 1.0, ..flat() };
        let low = response_db(&params, 48_000.0, 50.0);
        let high = response_db(&params, 48_000.0, 15_000.0);
        assert!(low < -4.0, "low {low}");
        assert!(high > 4.0, "high {high}");
    }

    #[test]
    fn frequency_response_uses_current_parameters() {
        let eq = Equalizer::new();
        eq.apply_parameters(&EqParams {
            low_gain_db: 12.0,
            ..flat()
        });
        let response = eq.frequency_response(&[30.0, 10_000.0]);
        assert_eq!(response.len(), 2);
        assert!(response[0] > 9.0);
        assert!(response[1].abs() < 1.0);
    }

    #[test]
    fn analog_stage_stays_bounded() {
        let mut eq = Equalizer::new();
        eq.prepare(&ProcessSpec::new(48_000.0, 256, 1).unwrap());
        eq.apply_parameters(&EqParams {
            analog: true,
            ..flat()
        });
        let mut buffer = AudioBuffer::new(1, 256);
        buffer.channel_mut(0).fill(10.0);
        eq.process_block(&mut buffer);
        assert!(buffer.peak() <= 1.0 / ANALOG_DRIVE + 1e-3);
    }
}
