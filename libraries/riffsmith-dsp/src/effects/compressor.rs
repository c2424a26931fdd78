//! Dynamic Range Compressor
//!
//! Attenuates signals above a threshold. Stereo channels are linked: the
//! louder channel drives a single gain computer, which preserves the image.
//!
//! Two-stage detector:
//! 1. Level detection, either peak hold (instant attack, slow release) or
//!    RMS over a 10 ms window
//! 2. Gain smoothing with the user attack/release
//!
//! Lookahead delays the audio path so the gain computer sees transients
//! before they arrive; `mix` blends the compressed signal with the
//! (equally delayed) dry signal for parallel compression.

use super::unit::{EffectUnit, Lifecycle, UnitState};
use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::params::{AtomicChoice, AtomicF32, ChangeTracker, Parameter};
use crate::primitives::{db_to_gain, gain_to_db, mix_dry_wet, sanitize, DelayLine};
use riffsmith_core::{ranges, BlockKind, CompressorParams, DetectorMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const NOISE_FLOOR_DB: f32 = -120.0;

/// Release of the peak-hold stage; holds peaks across ~50 cycles at 1 kHz
const PEAK_RELEASE_MS: f32 = 50.0;

/// Averaging time of the RMS detector
const RMS_WINDOW_MS: f32 = 10.0;

/// Mean-square floor, -120 dB
const MEAN_SQUARE_FLOOR: f32 = 1e-12;

/// Knee width at `knee = 1.0`
const MAX_KNEE_DB: f32 = 12.0;

/// Level meters written once per block by the audio thread
#[derive(Debug, Default)]
pub struct CompressorMeter {
    gain_reduction_db: AtomicF32,
    input_db: AtomicF32,
    output_db: AtomicF32,
}

impl CompressorMeter {
    /// Deepest gain reduction of the last block (≤ 0 dB)
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db.load()
    }

    /// Peak input level of the last block
    pub fn input_db(&self) -> f32 {
        self.input_db.load()
    }

    /// Peak output level of the last block
    pub fn output_db(&self) -> f32 {
        self.output_db.load()
    }
}

#[derive(Debug)]
pub struct CompressorParameters {
    enabled: AtomicBool,
    pub ratio: Parameter,
    pub threshold_db: Parameter,
    pub attack_ms: Parameter,
    pub release_ms: Parameter,
    pub makeup_db: Parameter,
    pub knee: Parameter,
    pub lookahead_ms: Parameter,
    pub mix: Parameter,
    detector: AtomicChoice<DetectorMode>,
    pub meter: CompressorMeter,
}

impl CompressorParameters {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            ratio: Parameter::new("ratio", ranges::compressor::RATIO),
            threshold_db: Parameter::new("threshold_db", ranges::compressor::THRESHOLD_DB),
            attack_ms: Parameter::new("attack_ms", ranges::compressor::ATTACK_MS),
            release_ms: Parameter::new("release_ms", ranges::compressor::RELEASE_MS),
            makeup_db: Parameter::new("makeup_db", ranges::compressor::MAKEUP_DB),
            knee: Parameter::new("knee", ranges::compressor::KNEE),
            lookahead_ms: Parameter::new("lookahead_ms", ranges::compressor::LOOKAHEAD_MS),
            mix: Parameter::new("mix", ranges::compressor::MIX),
            detector: AtomicChoice::new(DetectorMode::Peak),
            meter: CompressorMeter::default(),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_detector(&self, mode: DetectorMode) {
        self.detector.store(mode);
    }

    pub fn detector(&self) -> DetectorMode {
        self.detector.load()
    }

    pub fn apply(&self, params: &CompressorParams) {
        self.ratio.set(params.ratio);
        self.threshold_db.set(params.threshold_db);
        self.attack_ms.set(params.attack_ms);
        self.release_ms.set(params.release_ms);
        self.makeup_db.set(params.makeup_db);
        self.knee.set(params.knee);
        self.lookahead_ms.set(params.lookahead_ms);
        self.mix.set(params.mix);
        self.set_detector(params.detector);
        self.set_enabled(params.enabled);
    }

    pub fn snapshot(&self) -> CompressorParams {
        CompressorParams {
            enabled: self.is_enabled(),
            ratio: self.ratio.get(),
            threshold_db: self.threshold_db.get(),
            attack_ms: self.attack_ms.get(),
            release_ms: self.release_ms.get(),
            makeup_db: self.makeup_db.get(),
            knee: self.knee.get(),
            lookahead_ms: self.lookahead_ms.get(),
            mix: self.mix.get(),
            detector: self.detector(),
        }
    }
}

impl Default for CompressorParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// Static gain curve: output level (dB) for an input level (dB)
#[inline]
pub fn output_level_db(input_db: f32, threshold_db: f32, ratio: f32, knee_db: f32) -> f32 {
    if knee_db <= 0.0 {
        if input_db <= threshold_db {
            input_db
        } else {
            threshold_db + (input_db - threshold_db) / ratio
        }
    } else {
        let half_knee = knee_db / 2.0;
        let knee_start = threshold_db - half_knee;
        let knee_end = threshold_db + half_knee;

        if input_db <= knee_start {
            input_db
        } else if input_db >= knee_end {
            threshold_db + (input_db - threshold_db) / ratio
        } else {
            // Quadratic transition through the knee
            let x = input_db - knee_start;
            let slope_change = (1.0 - 1.0 / ratio) / (2.0 * knee_db);
            input_db - slope_change * x * x
        }
    }
}

pub struct Compressor {
    params: Arc<CompressorParameters>,
    lifecycle: Lifecycle,
    tracker: ChangeTracker<3>,

    peak_level_db: f32,
    mean_square: f32,
    gain_reduction_db: f32,
    lookahead: [DelayLine; 2],

    // Coefficient cache
    peak_release_coeff: f32,
    rms_coeff: f32,
    gr_attack_coeff: f32,
    gr_release_coeff: f32,
    makeup_gain_linear: f32,
}

impl Compressor {
    pub fn new() -> Self {
        Self::with_parameters(Arc::new(CompressorParameters::new()))
    }

    pub fn with_parameters(params: Arc<CompressorParameters>) -> Self {
        Self {
            params,
            lifecycle: Lifecycle::new(),
            tracker: ChangeTracker::new(),
            peak_level_db: NOISE_FLOOR_DB,
            mean_square: MEAN_SQUARE_FLOOR,
            gain_reduction_db: 0.0,
            lookahead: Default::default(),
            peak_release_coeff: 0.0,
            rms_coeff: 0.0,
            gr_attack_coeff: 0.0,
            gr_release_coeff: 0.0,
            makeup_gain_linear: 1.0,
        }
    }

    pub fn parameters(&self) -> Arc<CompressorParameters> {
        Arc::clone(&self.params)
    }

    pub fn apply_parameters(&self, params: &CompressorParams) {
        self.params.apply(params);
    }

    fn update_coefficients(&mut self, p: &CompressorParams) {
        if !self.tracker.update([p.attack_ms, p.release_ms, p.makeup_db]) {
            return;
        }
        let sr = self.lifecycle.sample_rate();

        self.peak_release_coeff = (-1.0 / (PEAK_RELEASE_MS * sr / 1000.0)).exp();
        self.rms_coeff = (-1.0 / (RMS_WINDOW_MS * sr / 1000.0)).exp();

        // 63.2% of the step after the configured time
        self.gr_attack_coeff = (-1.0 / (p.attack_ms * sr / 1000.0)).exp();
        self.gr_release_coeff = (-1.0 / (p.release_ms * sr / 1000.0)).exp();

        self.makeup_gain_linear = db_to_gain(p.makeup_db);
    }

    /// Instant attack, fixed-rate decay toward the noise floor
    #[inline]
    fn update_peak_level(&mut self, input_db: f32) {
        if input_db > self.peak_level_db {
            self.peak_level_db = input_db;
        } else {
            self.peak_level_db =
                self.peak_release_coeff * (self.peak_level_db - NOISE_FLOOR_DB) + NOISE_FLOOR_DB;
        }
    }

    /// One-pole average of the squared level, in dB
    #[inline]
    fn update_rms_level(&mut self, level: f32) -> f32 {
        let a = self.rms_coeff;
        self.mean_square = (a * self.mean_square + (1.0 - a) * level * level).max(MEAN_SQUARE_FLOOR);
        10.0 * self.mean_square.log10()
    }

    /// Level the gain computer sees for this frame
    #[inline]
    fn detect(&mut self, mode: DetectorMode, level: f32) -> f32 {
        match mode {
            DetectorMode::Peak => {
                let input_db = if level > 1e-10 { gain_to_db(level) } else { -200.0 };
                self.update_peak_level(input_db);
                self.peak_level_db
            }
            DetectorMode::Rms => self.update_rms_level(level),
        }
    }

    #[inline]
    fn smooth_gain_reduction(&mut self, target_gr_db: f32) {
        // More negative target = attacking
        let coeff = if target_gr_db < self.gain_reduction_db {
            self.gr_attack_coeff
        } else {
            self.gr_release_coeff
        };
        self.gain_reduction_db = coeff * self.gain_reduction_db + (1.0 - coeff) * target_gr_db;
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectUnit for Compressor {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.lifecycle.prepare(self.name(), spec);
        let capacity = spec.ms_to_samples(ranges::compressor::LOOKAHEAD_MS.max) + 2;
        for line in &mut self.lookahead {
            line.resize(capacity);
        }
        self.tracker.invalidate();
        self.reset();
    }

    fn process_block(&mut self, buffer: &mut AudioBuffer) {
        if !self.lifecycle.is_prepared() || !self.params.is_enabled() {
            return;
        }

        let p = self.params.snapshot();
        self.update_coefficients(&p);

        let knee_db = p.knee * MAX_KNEE_DB;
        let lookahead = self
            .lifecycle
            .spec()
            .map_or(0, |spec| spec.ms_to_samples(p.lookahead_ms));
        let stereo = buffer.num_channels() > 1;

        let mut input_peak = 0.0f32;
        let mut output_peak = 0.0f32;
        let mut deepest_gr = 0.0f32;

        // Split borrows so the per-frame closure can update detector state
        let mut lines = std::mem::take(&mut self.lookahead);
        let [left_line, right_line] = &mut lines;

        buffer.for_each_frame(|left, right| {
            let level = if stereo {
                left.abs().max(right.abs())
            } else {
                left.abs()
            };
            input_peak = input_peak.max(level);

            let detected_db = self.detect(p.detector, level);
            let target =
                output_level_db(detected_db, p.threshold_db, p.ratio, knee_db) - detected_db;
            self.smooth_gain_reduction(target);
            deepest_gr = deepest_gr.min(self.gain_reduction_db);

            let gain = db_to_gain(self.gain_reduction_db) * self.makeup_gain_linear;

            let (dry_l, dry_r) = if lookahead > 0 {
                left_line.push(*left);
                right_line.push(*right);
                (left_line.read(lookahead + 1), right_line.read(lookahead + 1))
            } else {
                (*left, *right)
            };

            *left = sanitize(mix_dry_wet(dry_l, dry_l * gain, p.mix));
            *right = sanitize(mix_dry_wet(dry_r, dry_r * gain, p.mix));
            output_peak = output_peak.max(if stereo {
                left.abs().max(right.abs())
            } else {
                left.abs()
            });
        });

        self.lookahead = lines;

        let meter = &self.params.meter;
        meter.input_db.store(gain_to_db(input_peak));
        meter.output_db.store(gain_to_db(output_peak));
        meter.gain_reduction_db.store(deepest_gr);
    }

    fn release(&mut self) {
        self.lifecycle.release(self.name());
    }

    fn reset(&mut self) {
        self.peak_level_db = NOISE_FLOOR_DB;
        self.mean_square = MEAN_SQUARE_FLOOR;
        self.gain_reduction_db = 0.0;
        for line in &mut self.lookahead {
            line.clear();
        }
    }

    fn is_enabled(&self) -> bool {
        self.params.is_enabled()
    }

    fn state(&self) -> UnitState {
        self.lifecycle.state()
    }

    fn kind(&self) -> BlockKind {
        BlockKind::Compressor
    }

    fn name(&self) -> &'static str {
        "Compressor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::tests::sine_buffer;

    fn prepared(params: &CompressorParams) -> Compressor {
        let mut comp = Compressor::new();
        comp.prepare(&ProcessSpec::new(44_100.0, 8192, 2).unwrap());
        comp.apply_parameters(params);
        comp
    }

    fn hard_4_to_1() -> CompressorParams {
        CompressorParams {
            threshold_db: -20.0,
            ratio: 4.0,
            knee: 0.0,
            makeup_db: 0.0,
            attack_ms: 1.0,
            release_ms: 50.0,
            lookahead_ms: 0.0,
            mix: 1.0,
            ..CompressorParams::default()
        }
    }

    #[test]
    fn static_curve_hard_knee() {
        assert_eq!(output_level_db(-30.0, -20.0, 4.0, 0.0), -30.0);
        assert!((output_level_db(-10.0, -20.0, 4.0, 0.0) - (-17.5)).abs() < 1e-5);
    }

    #[test]
    fn static_curve_soft_knee_is_continuous() {
        let threshold = -20.0;
        let knee = 6.0;
        let below = output_level_db(threshold - knee / 2.0, threshold, 4.0, knee);
        assert!((below - (threshold - knee / 2.0)).abs() < 1e-4);
        let above = output_level_db(threshold + knee / 2.0, threshold, 4.0, knee);
        let expected = threshold + (knee / 2.0) / 4.0;
        assert!((above - expected).abs() < 1e-4);
    }

    #[test]
    fn loud_signal_is_reduced() {
        let mut comp = prepared(&hard_4_to_1());
        let mut buffer = sine_buffer(1000.0, 44_100.0, 8192, 1.0);
        comp.process_block(&mut buffer);

        let tail = &buffer.channel(0)[4096..];
        let peak = tail.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        // 0 dB in, -20 dB threshold, 4:1 => -15 dB out
        let expected = db_to_gain(-15.0);
        assert!((peak - expected).abs() < 0.05, "peak {peak}, expected {expected}");

        let meter = &comp.parameters().meter;
        assert!(meter.gain_reduction_db() < -10.0);
        assert!(meter.input_db() > -0.5);
    }

    #[test]
    fn rms_detector_compresses_a_sine_by_its_average_level() {
        let run = |detector| {
            let mut comp = prepared(&CompressorParams {
                detector,
                ..hard_4_to_1()
            });
            let mut buffer = sine_buffer(1000.0, 44_100.0, 8192, 1.0);
            comp.process_block(&mut buffer);
            buffer.channel(0)[4096..]
                .iter()
                .fold(0.0f32, |a, s| a.max(s.abs()))
        };

        let peak_mode = run(DetectorMode::Peak);
        let rms_mode = run(DetectorMode::Rms);

        // Full-scale sine reads -3 dB RMS: -20 + 17 / 4 = -15.75 dB out,
        // so the peaks sit 12.75 dB down instead of 15
        let expected = db_to_gain(-12.75);
        assert!((rms_mode - expected).abs() < 0.03, "rms {rms_mode}, expected {expected}");
        assert!(rms_mode > peak_mode * 1.2, "rms {rms_mode}, peak {peak_mode}");
    }

    #[test]
    fn detector_mode_round_trips_through_parameters() {
        let params = CompressorParameters::new();
        assert_eq!(params.detector(), DetectorMode::Peak);
        params.apply(&CompressorParams {
            detector: DetectorMode::Rms,
            ..CompressorParams::default()
        });
        assert_eq!(params.snapshot().detector, DetectorMode::Rms);
    }

    #[test]
    fn quiet_signal_is_untouched() {
        let mut comp = prepared(&hard_4_to_1());
        let mut buffer = sine_buffer(1000.0, 44_100.0, 4096, 0.01);
        let original = buffer.clone();
        comp.process_block(&mut buffer);
        for (a, b) in buffer.as_slice().iter().zip(original.as_slice()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn zero_mix_is_dry() {
        let mut comp = prepared(&CompressorParams {
            mix: 0.0,
            ..hard_4_to_1()
        });
        let mut buffer = sine_buffer(1000.0, 44_100.0, 4096, 1.0);
        let original = buffer.clone();
        comp.process_block(&mut buffer);
        for (a, b) in buffer.as_slice().iter().zip(original.as_slice()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn lookahead_delays_audio() {
        let mut comp = prepared(&CompressorParams {
            lookahead_ms: 10.0,
            threshold_db: 0.0,
            ..hard_4_to_1()
        });
        let mut buffer = AudioBuffer::new(2, 1024);
        buffer.channel_mut(0)[0] = 0.5;
        comp.process_block(&mut buffer);

        // 10 ms at 44.1 kHz
        let ch = buffer.channel(0);
        assert!(ch[0].abs() < 1e-6);
        assert!((ch[441] - 0.5).abs() < 1e-3, "delayed sample {}", ch[441]);
    }
}
