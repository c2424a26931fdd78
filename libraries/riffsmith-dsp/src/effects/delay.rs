//! Stereo delay
//!
//! Ring buffers hold two seconds at the prepared rate. The feedback path runs
//! through a low cut, a high cut and an optional all-pass diffuser; `spread`
//! cross-feeds the repeats between channels (ping-pong).

use super::unit::{EffectUnit, Lifecycle, UnitState};
use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::params::{ChangeTracker, Parameter};
use crate::primitives::{
    mix_dry_wet, sanitize, AllPassDelay, Biquad, BiquadCoefficients, DelayLine, Lfo,
};
use riffsmith_core::{ranges, BlockKind, ChorusWaveform, DelayParams};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Time-modulation excursion at depth 1.0
const MAX_MOD_MS: f32 = 3.0;

/// Diffuser all-pass lengths (left, right)
const DIFFUSER_MS: [f32; 2] = [4.7, 6.3];

/// Per-sample glide of the delay time toward its target
const TIME_GLIDE: f32 = 0.001;

#[derive(Debug)]
pub struct DelayParameters {
    enabled: AtomicBool,
    pub time_ms: Parameter,
    pub feedback: Parameter,
    pub mix: Parameter,
    pub mod_rate_hz: Parameter,
    pub mod_depth: Parameter,
    pub high_cut_hz: Parameter,
    pub low_cut_hz: Parameter,
    pub spread: Parameter,
    pub diffusion: Parameter,
}

impl DelayParameters {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            time_ms: Parameter::new("time_ms", ranges::delay::TIME_MS),
            feedback: Parameter::new("feedback", ranges::delay::FEEDBACK),
            mix: Parameter::new("mix", ranges::delay::MIX),
            mod_rate_hz: Parameter::new("mod_rate_hz", ranges::delay::MOD_RATE_HZ),
            mod_depth: Parameter::new("mod_depth", ranges::delay::MOD_DEPTH),
            high_cut_hz: Parameter::new("high_cut_hz", ranges::delay::HIGH_CUT_HZ),
            low_cut_hz: Parameter::new("low_cut_hz", ranges::delay::LOW_CUT_HZ),
            spread: Parameter::new("spread", ranges::delay::SPREAD),
            diffusion: Parameter::new("diffusion", ranges::delay::DIFFUSION),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn apply(&self, params: &DelayParams) {
        self.time_ms.set(params.time_ms);
        self.feedback.set(params.feedback);
        self.mix.set(params.mix);
        self.mod_rate_hz.set(params.mod_rate_hz);
        self.mod_depth.set(params.mod_depth);
        self.high_cut_hz.set(params.high_cut_hz);
        self.low_cut_hz.set(params.low_cut_hz);
        self.spread.set(params.spread);
        self.diffusion.set(params.diffusion);
        self.set_enabled(params.enabled);
    }

    pub fn snapshot(&self) -> DelayParams {
        DelayParams {
            enabled: self.is_enabled(),
            time_ms: self.time_ms.get(),
            feedback: self.feedback.get(),
            mix: self.mix.get(),
            mod_rate_hz: self.mod_rate_hz.get(),
            mod_depth: self.mod_depth.get(),
            high_cut_hz: self.high_cut_hz.get(),
            low_cut_hz: self.low_cut_hz.get(),
            spread: self.spread.get(),
            diffusion: self.diffusion.get(),
        }
    }
}

impl Default for DelayParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-channel feedback path
#[derive(Debug, Clone, Default)]
struct Tap {
    line: DelayLine,
    low_cut: Biquad,
    high_cut: Biquad,
    diffuser: AllPassDelay,
}

impl Tap {
    fn clear(&mut self) {
        self.line.clear();
        self.low_cut.reset();
        self.high_cut.reset();
        self.diffuser.clear();
    }

    #[inline]
    fn filter_feedback(&mut self, wet: f32, diffusion: f32) -> f32 {
        let filtered = self.high_cut.process(self.low_cut.process(wet));
        if diffusion > 0.0 {
            let smeared = self.diffuser.process(filtered, diffusion * 0.7);
            mix_dry_wet(filtered, smeared, diffusion)
        } else {
            filtered
        }
    }
}

pub struct Delay {
    params: Arc<DelayParameters>,
    lifecycle: Lifecycle,
    tracker: ChangeTracker<2>,
    taps: [Tap; 2],
    lfo: Lfo,
    time_samples: f32,
    time_initialized: bool,
}

impl Delay {
    pub fn new() -> Self {
        Self::with_parameters(Arc::new(DelayParameters::new()))
    }

    pub fn with_parameters(params: Arc<DelayParameters>) -> Self {
        Self {
            params,
            lifecycle: Lifecycle::new(),
            tracker: ChangeTracker::new(),
            taps: Default::default(),
            lfo: Lfo::new(),
            time_samples: 0.0,
            time_initialized: false,
        }
    }

    pub fn parameters(&self) -> Arc<DelayParameters> {
        Arc::clone(&self.params)
    }

    pub fn apply_parameters(&self, params: &DelayParams) {
        self.params.apply(params);
    }

    /// Ring buffer length in samples (0 before `prepare`)
    pub fn delay_capacity(&self) -> usize {
        if self.lifecycle.is_prepared() {
            self.taps[0].line.capacity()
        } else {
            0
        }
    }

    fn update_filters(&mut self, p: &DelayParams) {
        if !self.tracker.update([p.low_cut_hz, p.high_cut_hz]) {
            return;
        }
        let sample_rate = self.lifecycle.sample_rate();
        let low = BiquadCoefficients::high_pass(sample_rate, p.low_cut_hz, 0.707);
        let high = BiquadCoefficients::low_pass(sample_rate, p.high_cut_hz, 0.707);
        for tap in &mut self.taps {
            tap.low_cut.set_coefficients(low);
            tap.high_cut.set_coefficients(high);
        }
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectUnit for Delay {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.lifecycle.prepare(self.name(), spec);
        let capacity = spec.ms_to_samples(ranges::delay::MAX_SECONDS * 1000.0);
        for (tap, diffuser_ms) in self.taps.iter_mut().zip(DIFFUSER_MS) {
            tap.line.resize(capacity);
            tap.diffuser = AllPassDelay::new(spec.ms_to_samples(diffuser_ms));
        }
        self.tracker.invalidate();
        self.reset();
    }

    fn process_block(&mut self, buffer: &mut AudioBuffer) {
        if !self.lifecycle.is_prepared() || !self.params.is_enabled() {
            return;
        }

        let p = self.params.snapshot();
        self.update_filters(&p);

        let sample_rate = self.lifecycle.sample_rate();
        let samples_per_ms = sample_rate / 1000.0;
        let max_delay = (self.taps[0].line.capacity() as f32 - 2.0).max(1.0);
        let target = (p.time_ms * samples_per_ms).min(max_delay);
        if !self.time_initialized {
            self.time_samples = target;
            self.time_initialized = true;
        }
        self.lfo.set_rate(p.mod_rate_hz, sample_rate);
        let excursion = p.mod_depth * MAX_MOD_MS * samples_per_ms;

        let [left_tap, right_tap] = &mut self.taps;
        let lfo = &mut self.lfo;
        let time = &mut self.time_samples;

        buffer.for_each_frame(|left, right| {
            *time += (target - *time) * TIME_GLIDE;
            let delay = (*time + excursion * lfo.value(ChorusWaveform::Sine, 0.0))
                .clamp(1.0, max_delay);
            lfo.advance();

            let wet_l = left_tap.line.read_fractional(delay);
            let wet_r = right_tap.line.read_fractional(delay);

            let fb_l = left_tap.filter_feedback(wet_l, p.diffusion);
            let fb_r = right_tap.filter_feedback(wet_r, p.diffusion);
            let into_l = fb_l * (1.0 - p.spread) + fb_r * p.spread;
            let into_r = fb_r * (1.0 - p.spread) + fb_l * p.spread;

            left_tap.line.push(sanitize(*left + into_l * p.feedback));
            right_tap.line.push(sanitize(*right + into_r * p.feedback));

            *left = mix_dry_wet(*left, wet_l, p.mix);
            *right = mix_dry_wet(*right, wet_r, p.mix);
        });
    }

    fn release(&mut self) {
        self.lifecycle.release(self.name());
    }

    fn reset(&mut self) {
        for tap in &mut self.taps {
            tap.clear();
        }
        self.lfo.reset();
        self.time_initialized = false;
    }

    fn is_enabled(&self) -> bool {
        self.params.is_enabled()
    }

    fn state(&self) -> UnitState {
        self.lifecycle.state()
    }

    fn kind(&self) -> BlockKind {
        BlockKind::Delay
    }

    fn name(&self) -> &'static str {
        "Delay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_echo() -> DelayParams {
        DelayParams {
            time_ms: 100.0,
            feedback: 0.0,
            mix: 1.0,
            mod_depth: 0.0,
            low_cut_hz: 20.0,
            high_cut_hz: 20_000.0,
            spread: 0.0,
            diffusion: 0.0,
            ..DelayParams::default()
        }
    }

    #[test]
    fn capacity_holds_two_seconds() {
        let mut delay = Delay::new();
        assert_eq!(delay.delay_capacity(), 0);
        delay.prepare(&ProcessSpec::new(48_000.0, 512, 2).unwrap());
        assert_eq!(delay.delay_capacity(), 96_000);
    }

    #[test]
    fn impulse_returns_after_delay_time() {
        let mut delay = Delay::new();
        delay.prepare(&ProcessSpec::new(48_000.0, 8192, 2).unwrap());
        delay.apply_parameters(&plain_echo());

        let mut buffer = AudioBuffer::new(2, 8192);
        buffer.channel_mut(0)[0] = 1.0;
        delay.process_block(&mut buffer);

        let ch = buffer.channel(0);
        let (peak_index, _) = ch
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |acc, (i, s)| if s.abs() > acc.1 { (i, s.abs()) } else { acc });
        assert!((4795..=4805).contains(&peak_index), "echo at {peak_index}");
    }

    #[test]
    fn feedback_produces_decaying_repeats() {
        let mut delay = Delay::new();
        delay.prepare(&ProcessSpec::new(48_000.0, 24_000, 1).unwrap());
        delay.apply_parameters(&DelayParams {
            feedback: 0.5,
            ..plain_echo()
        });

        let mut buffer = AudioBuffer::new(1, 24_000);
        buffer.channel_mut(0)[0] = 1.0;
        delay.process_block(&mut buffer);

        let ch = buffer.channel(0);
        let first = ch[4790..4810].iter().fold(0.0f32, |a, s| a.max(s.abs()));
        let second = ch[9590..9610].iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(second > 0.2 && second < first, "first {first}, second {second}");
    }

    #[test]
    fn full_spread_ping_pongs() {
        let mut delay = Delay::new();
        delay.prepare(&ProcessSpec::new(48_000.0, 12_000, 2).unwrap());
        delay.apply_parameters(&DelayParams {
            feedback: 0.8,
            spread: 1.0,
            ..plain_echo()
        });

        let mut buffer = AudioBuffer::new(2, 12_000);
        buffer.channel_mut(0)[0] = 1.0;
        delay.process_block(&mut buffer);

        // Second repeat lands on the right channel only
        let right = buffer.channel(1)[9590..9610]
            .iter()
            .fold(0.0f32, |a, s| a.max(s.abs()));
        let left = buffer.channel(0)[9590..9610]
            .iter()
            .fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(right > 0.3, "right {right}");
        assert!(left < 0.05, "left {left}");
    }

    #[test]
    fn max_feedback_stays_finite() {
        let mut delay = Delay::new();
        delay.prepare(&ProcessSpec::new(44_100.0, 2048, 2).unwrap());
        delay.apply_parameters(&DelayParams {
            time_ms: 40.0,
            feedback: 0.95,
            diffusion: 1.0,
            mod_depth: 1.0,
            mod_rate_hz: 2.0,
            ..DelayParams::default()
        });
        for _ in 0..100 {
            let mut buffer = AudioBuffer::new(2, 2048);
            buffer.as_mut_slice().fill(0.5);
            delay.process_block(&mut buffer);
            assert!(buffer.as_slice().iter().all(|s| s.is_finite()));
        }
    }
}
