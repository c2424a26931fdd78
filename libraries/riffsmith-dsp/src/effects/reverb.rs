//! Algorithmic reverb
//!
//! Freeverb topology: eight damped feedback combs in parallel followed by four
//! series all-passes per channel, the right channel detuned by a fixed
//! spread. Algorithms differ only in how decay and damping map onto room
//! size, damping and stereo width. Shimmer feeds a pitch-shifted copy of the
//! tail back into the tank.

use super::unit::{EffectUnit, Lifecycle, UnitState};
use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::params::{AtomicChoice, ChangeTracker, Parameter};
use crate::primitives::{mix_dry_wet, sanitize, AllPassDelay, DelayLine, Lfo, OnePoleLowPass};
use riffsmith_core::{ranges, BlockKind, ChorusWaveform, ReverbAlgorithm, ReverbParams};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Comb lengths in samples at 44.1 kHz
const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// All-pass lengths in samples at 44.1 kHz
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];

/// Right-channel detune in samples at 44.1 kHz
const STEREO_SPREAD: usize = 23;

const TUNING_RATE: f32 = 44_100.0;
const FIXED_GAIN: f32 = 0.015;
const WET_SCALE: f32 = 3.0;
const ROOM_SCALE: f32 = 0.28;
const ROOM_OFFSET: f32 = 0.7;
const DAMP_SCALE: f32 = 0.4;
const ALLPASS_FEEDBACK: f32 = 0.5;

/// Pre-delay modulation excursion at depth 1.0
const MAX_MOD_MS: f32 = 1.0;

/// Shimmer grain window
const SHIMMER_WINDOW_MS: f32 = 50.0;

/// Portion of the shifted tail fed back into the tank at shimmer mix 1.0
const SHIMMER_FEEDBACK: f32 = 0.3;

/// Room size, damping and width derived from the user controls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankSettings {
    pub room_size: f32,
    pub damping: f32,
    pub width: f32,
}

impl TankSettings {
    /// Map decay (seconds) and damping onto the tank for an algorithm
    pub fn for_algorithm(algorithm: ReverbAlgorithm, decay_s: f32, damping: f32) -> Self {
        let decay = decay_s / ranges::reverb::DECAY_S.max;
        let (room_size, damping, width) = match algorithm {
            ReverbAlgorithm::Room => (0.3 + decay * 0.4, 0.5 + damping * 0.4, 0.8),
            ReverbAlgorithm::Plate => (0.5 + decay * 0.3, 0.3 + damping * 0.5, 1.0),
            ReverbAlgorithm::Hall => (0.7 + decay * 0.3, 0.2 + damping * 0.6, 1.0),
            ReverbAlgorithm::Shimmer => (0.8 + decay * 0.2, 0.1 + damping * 0.4, 1.0),
        };
        Self {
            room_size: room_size.clamp(0.0, 1.0),
            damping: damping.clamp(0.0, 1.0),
            width,
        }
    }
}

#[derive(Debug)]
pub struct ReverbParameters {
    enabled: AtomicBool,
    pub pre_delay_ms: Parameter,
    pub decay_s: Parameter,
    pub damping: Parameter,
    pub mix: Parameter,
    pub mod_rate_hz: Parameter,
    pub mod_depth: Parameter,
    pub shimmer_pitch: Parameter,
    pub shimmer_mix: Parameter,
    algorithm: AtomicChoice<ReverbAlgorithm>,
}

impl ReverbParameters {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            pre_delay_ms: Parameter::new("pre_delay_ms", ranges::reverb::PRE_DELAY_MS),
            decay_s: Parameter::new("decay_s", ranges::reverb::DECAY_S),
            damping: Parameter::new("damping", ranges::reverb::DAMPING),
            mix: Parameter::new("mix", ranges::reverb::MIX),
            mod_rate_hz: Parameter::new("mod_rate_hz", ranges::reverb::MOD_RATE_HZ),
            mod_depth: Parameter::new("mod_depth", ranges::reverb::MOD_DEPTH),
            shimmer_pitch: Parameter::new("shimmer_pitch", ranges::reverb::SHIMMER_PITCH),
            shimmer_mix: Parameter::new("shimmer_mix", ranges::reverb::SHIMMER_MIX),
            algorithm: AtomicChoice::new(ReverbAlgorithm::Hall),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_algorithm(&self, algorithm: ReverbAlgorithm) {
        self.algorithm.store(algorithm);
    }

    pub fn algorithm(&self) -> ReverbAlgorithm {
        self.algorithm.load()
    }

    pub fn apply(&self, params: &ReverbParams) {
        self.pre_delay_ms.set(params.pre_delay_ms);
        self.decay_s.set(params.decay_s);
        self.damping.set(params.damping);
        self.mix.set(params.mix);
        self.mod_rate_hz.set(params.mod_rate_hz);
        self.mod_depth.set(params.mod_depth);
        self.shimmer_pitch.set(params.shimmer_pitch);
        self.shimmer_mix.set(params.shimmer_mix);
        self.set_algorithm(params.algorithm);
        self.set_enabled(params.enabled);
    }

    pub fn snapshot(&self) -> ReverbParams {
        ReverbParams {
            enabled: self.is_enabled(),
            pre_delay_ms: self.pre_delay_ms.get(),
            decay_s: self.decay_s.get(),
            damping: self.damping.get(),
            mix: self.mix.get(),
            mod_rate_hz: self.mod_rate_hz.get(),
            mod_depth: self.mod_depth.get(),
            shimmer_pitch: self.shimmer_pitch.get(),
            shimmer_mix: self.shimmer_mix.get(),
            algorithm: self.algorithm(),
        }
    }
}

impl Default for ReverbParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowpass-feedback comb filter
#[derive(Debug, Clone, Default)]
struct Comb {
    line: DelayLine,
    length: usize,
    store: f32,
}

impl Comb {
    fn new(length: usize) -> Self {
        Self {
            line: DelayLine::new(length),
            length: length.max(1),
            store: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.line.read(self.length);
        self.store = sanitize(output * (1.0 - damp) + self.store * damp);
        self.line.push(input + self.store * feedback);
        output
    }

    fn clear(&mut self) {
        self.line.clear();
        self.store = 0.0;
    }
}

/// Delay-line pitch shifter with two crossfaded read heads
#[derive(Debug, Clone, Default)]
struct PitchShifter {
    line: DelayLine,
    window: f32,
    phase: f32,
}

impl PitchShifter {
    fn prepare(&mut self, window_samples: usize) {
        self.line.resize(window_samples + 4);
        self.window = window_samples.max(1) as f32;
        self.phase = 0.0;
    }

    #[inline]
    fn process(&mut self, input: f32, ratio: f32) -> f32 {
        self.line.push(input);
        self.phase = (self.phase + (1.0 - ratio) / self.window).rem_euclid(1.0);

        let second = (self.phase + 0.5).rem_euclid(1.0);
        let tap = |phase: f32| {
            let gain = 1.0 - (2.0 * phase - 1.0).abs();
            self.line.read_fractional(1.0 + phase * self.window) * gain
        };
        tap(self.phase) + tap(second)
    }

    fn clear(&mut self) {
        self.line.clear();
        self.phase = 0.0;
    }
}

/// One channel of the tank
#[derive(Debug, Clone, Default)]
struct Tank {
    combs: Vec<Comb>,
    allpasses: Vec<AllPassDelay>,
}

impl Tank {
    fn prepare(&mut self, scale: f32, spread: usize) {
        let scaled = |length: usize| ((length + spread) as f32 * scale).round() as usize;
        self.combs = COMB_TUNING.iter().map(|&l| Comb::new(scaled(l))).collect();
        self.allpasses = ALLPASS_TUNING
            .iter()
            .map(|&l| AllPassDelay::new(scaled(l)))
            .collect();
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(input, feedback, damp);
        }
        for allpass in &mut self.allpasses {
            out = allpass.process(out, ALLPASS_FEEDBACK);
        }
        out
    }

    fn clear(&mut self) {
        for comb in &mut self.combs {
            comb.clear();
        }
        for allpass in &mut self.allpasses {
            allpass.clear();
        }
    }
}

pub struct Reverb {
    params: Arc<ReverbParameters>,
    lifecycle: Lifecycle,
    tracker: ChangeTracker<3>,
    tanks: [Tank; 2],
    pre_delay: DelayLine,
    post_filters: [OnePoleLowPass; 2],
    shifter: PitchShifter,
    shimmer_return: f32,
    lfo: Lfo,
    settings: TankSettings,
}

impl Reverb {
    pub fn new() -> Self {
        Self::with_parameters(Arc::new(ReverbParameters::new()))
    }

    pub fn with_parameters(params: Arc<ReverbParameters>) -> Self {
        Self {
            params,
            lifecycle: Lifecycle::new(),
            tracker: ChangeTracker::new(),
            tanks: Default::default(),
            pre_delay: DelayLine::default(),
            post_filters: Default::default(),
            shifter: PitchShifter::default(),
            shimmer_return: 0.0,
            lfo: Lfo::new(),
            settings: TankSettings::for_algorithm(ReverbAlgorithm::Hall, 4.5, 0.35),
        }
    }

    pub fn parameters(&self) -> Arc<ReverbParameters> {
        Arc::clone(&self.params)
    }

    pub fn apply_parameters(&self, params: &ReverbParams) {
        self.params.apply(params);
    }

    /// Tank settings currently in use
    pub fn settings(&self) -> TankSettings {
        self.settings
    }

    fn update_settings(&mut self, p: &ReverbParams) {
        if !self.tracker.update([
            p.decay_s,
            p.damping,
            f32::from(self.params.algorithm.load_index()),
        ]) {
            return;
        }
        self.settings = TankSettings::for_algorithm(p.algorithm, p.decay_s, p.damping);

        let cutoff = (20_000.0 * (1.0 - self.settings.damping)).clamp(1000.0, 20_000.0);
        let sample_rate = self.lifecycle.sample_rate();
        for filter in &mut self.post_filters {
            filter.set_cutoff(sample_rate, cutoff);
        }
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectUnit for Reverb {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.lifecycle.prepare(self.name(), spec);
        let scale = spec.sample_rate() / TUNING_RATE;
        self.tanks[0].prepare(scale, 0);
        self.tanks[1].prepare(scale, STEREO_SPREAD);

        let max_pre_delay = ranges::reverb::PRE_DELAY_MS.max + MAX_MOD_MS;
        self.pre_delay.resize(spec.ms_to_samples(max_pre_delay) + 4);
        self.shifter.prepare(spec.ms_to_samples(SHIMMER_WINDOW_MS));
        self.tracker.invalidate();
        self.reset();
    }

    fn process_block(&mut self, buffer: &mut AudioBuffer) {
        if !self.lifecycle.is_prepared() || !self.params.is_enabled() {
            return;
        }

        let p = self.params.snapshot();
        self.update_settings(&p);

        let sample_rate = self.lifecycle.sample_rate();
        let samples_per_ms = sample_rate / 1000.0;
        self.lfo.set_rate(p.mod_rate_hz, sample_rate);

        let feedback = self.settings.room_size * ROOM_SCALE + ROOM_OFFSET;
        let damp = self.settings.damping * DAMP_SCALE;
        let wet1 = self.settings.width / 2.0 + 0.5;
        let wet2 = (1.0 - self.settings.width) / 2.0;
        let pre_delay = p.pre_delay_ms * samples_per_ms;
        let excursion = p.mod_depth * MAX_MOD_MS * samples_per_ms;

        let shimmer = p.algorithm == ReverbAlgorithm::Shimmer;
        let ratio = 2.0_f32.powf(p.shimmer_pitch / 12.0);
        let mono = buffer.num_channels() == 1;

        let [left_tank, right_tank] = &mut self.tanks;
        let [left_post, right_post] = &mut self.post_filters;
        let pre_line = &mut self.pre_delay;
        let shifter = &mut self.shifter;
        let shimmer_return = &mut self.shimmer_return;
        let lfo = &mut self.lfo;

        buffer.for_each_frame(|left, right| {
            let dry_sum = if mono { *left } else { (*left + *right) * 0.5 };
            pre_line.push(dry_sum);
            let modulation = excursion * 0.5 * (1.0 + lfo.value(ChorusWaveform::Sine, 0.0));
            lfo.advance();
            let delayed = if pre_delay + modulation >= 1.0 {
                pre_line.read_fractional(pre_delay + modulation)
            } else {
                dry_sum
            };

            let input = (delayed + *shimmer_return) * FIXED_GAIN;
            let out_l = left_tank.process(input, feedback, damp);
            let out_r = right_tank.process(input, feedback, damp);

            let mut wet_l = left_post.process(out_l * wet1 + out_r * wet2) * WET_SCALE;
            let mut wet_r = right_post.process(out_r * wet1 + out_l * wet2) * WET_SCALE;

            if shimmer {
                let shifted = shifter.process((wet_l + wet_r) * 0.5, ratio);
                *shimmer_return = sanitize((shifted * SHIMMER_FEEDBACK * p.shimmer_mix).tanh());
                wet_l += shifted * p.shimmer_mix;
                wet_r += shifted * p.shimmer_mix;
            }

            *left = mix_dry_wet(*left, sanitize(wet_l), p.mix);
            *right = mix_dry_wet(*right, sanitize(wet_r), p.mix);
        });

        if !shimmer {
            self.shimmer_return = 0.0;
        }
    }

    fn release(&mut self) {
        self.lifecycle.release(self.name());
    }

    fn reset(&mut self) {
        for tank in &mut self.tanks {
            tank.clear();
        }
        for filter in &mut self.post_filters {
            filter.reset();
        }
        self.pre_delay.clear();
        self.shifter.clear();
        self.shimmer_return = 0.0;
        self.lfo.reset();
    }

    fn is_enabled(&self) -> bool {
        self.params.is_enabled()
    }

    fn state(&self) -> UnitState {
        self.lifecycle.state()
    }

    fn kind(&self) -> BlockKind {
        BlockKind::Reverb
    }

    fn name(&self) -> &'static str {
        "Reverb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn energy(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s * s).sum()
    }

    fn impulse_tail(params: &ReverbParams) -> AudioBuffer {
        let mut reverb = Reverb::new();
        reverb.prepare(&ProcessSpec::new(44_100.0, 44_100, 2).unwrap());
        reverb.apply_parameters(params);
        let mut buffer = AudioBuffer::new(2, 44_100);
        buffer.channel_mut(0)[0] = 1.0;
        buffer.channel_mut(1)[0] = 1.0;
        reverb.process_block(&mut buffer);
        buffer
    }

    #[test]
    fn algorithm_mapping_matches_table() {
        let room = TankSettings::for_algorithm(ReverbAlgorithm::Room, 0.0, 0.0);
        assert!((room.room_size - 0.3).abs() < 1e-6);
        assert!((room.damping - 0.5).abs() < 1e-6);
        assert!((room.width - 0.8).abs() < 1e-6);

        let hall = TankSettings::for_algorithm(ReverbAlgorithm::Hall, 12.0, 1.0);
        assert!((hall.room_size - 1.0).abs() < 1e-6);
        assert!((hall.damping - 0.8).abs() < 1e-6);

        let shimmer = TankSettings::for_algorithm(ReverbAlgorithm::Shimmer, 6.0, 0.5);
        assert!((shimmer.room_size - 0.9).abs() < 1e-6);
        assert!((shimmer.damping - 0.3).abs() < 1e-6);
    }

    #[test]
    fn impulse_produces_tail() {
        let buffer = impulse_tail(&ReverbParams {
            mix: 1.0,
            pre_delay_ms: 0.0,
            ..ReverbParams::default()
        });
        let late = &buffer.channel(0)[22_050..];
        assert!(energy(late) > 1e-6, "tail energy {}", energy(late));
    }

    #[test]
    fn longer_decay_rings_longer() {
        let tail = |decay_s: f32| {
            let buffer = impulse_tail(&ReverbParams {
                mix: 1.0,
                decay_s,
                algorithm: ReverbAlgorithm::Room,
                ..ReverbParams::default()
            });
            energy(&buffer.channel(0)[30_000..])
        };
        assert!(tail(12.0) > tail(0.2));
    }

    #[test]
    fn zero_mix_is_dry() {
        let buffer = impulse_tail(&ReverbParams {
            mix: 0.0,
            ..ReverbParams::default()
        });
        assert_eq!(buffer.channel(0)[0], 1.0);
        assert!(buffer.channel(0)[1..].iter().all(|s| s.abs() < 1e-9));
    }

    #[test]
    fn shimmer_stays_finite_under_sustained_input() {
        let mut reverb = Reverb::new();
        reverb.prepare(&ProcessSpec::new(48_000.0, 1024, 2).unwrap());
        reverb.apply_parameters(&ReverbParams {
            algorithm: ReverbAlgorithm::Shimmer,
            decay_s: 12.0,
            damping: 0.0,
            shimmer_mix: 1.0,
            mix: 1.0,
            ..ReverbParams::default()
        });
        for _ in 0..200 {
            let mut buffer = AudioBuffer::new(2, 1024);
            buffer.as_mut_slice().fill(0.5);
            reverb.process_block(&mut buffer);
            assert!(buffer.as_slice().iter().all(|s| s.is_finite()));
            assert!(buffer.peak() < 100.0);
        }
    }

    #[test]
    fn pitch_shifter_octave_up_doubles_frequency() {
        let mut shifter = PitchShifter::default();
        shifter.prepare(2400);
        let sample_rate = 48_000.0;
        let mut output = Vec::with_capacity(48_000);
        for n in 0..48_000 {
            let x = (std::f32::consts::TAU * 200.0 * n as f32 / sample_rate).sin();
            output.push(shifter.process(x, 2.0));
        }
        // 400 Hz gives ~400 zero crossings in half a second
        let tail = &output[24_000..];
        let crossings = tail
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count();
        assert!((300..=500).contains(&crossings), "crossings {crossings}");
    }
}
