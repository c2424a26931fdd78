//! Noise gate with hysteresis, hold and lookahead
//!
//! The gate opens when the detector rises above `threshold_db` and closes
//! only after it falls below `threshold_db - hysteresis_db` and the hold time
//! has elapsed. Modes:
//! - `Normal`: closed gate mutes
//! - `Ducking`: an open gate attenuates by `rhythm_depth`
//! - `Rhythmic`: an open gate is chopped by a square LFO at `rhythm_rate_hz`

use super::unit::{EffectUnit, Lifecycle, UnitState};
use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::params::{AtomicChoice, AtomicF32, ChangeTracker, Parameter};
use crate::primitives::{gain_to_db, DelayLine, Lfo};
use riffsmith_core::{ranges, BlockKind, ChorusWaveform, GateMode, NoiseGateParams};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Detector release; short enough to follow note decays
const DETECTOR_RELEASE_MS: f32 = 10.0;

/// Gate meters, written once per block by the audio thread
#[derive(Debug, Default)]
pub struct GateMeter {
    gate_gain: AtomicF32,
    input_db: AtomicF32,
    transitions: AtomicU32,
}

impl GateMeter {
    /// Gain applied at the end of the last block (0 = shut, 1 = open)
    pub fn gate_gain(&self) -> f32 {
        self.gate_gain.load()
    }

    /// Peak input level of the last block
    pub fn input_db(&self) -> f32 {
        self.input_db.load()
    }

    /// Open/close transitions since prepare (or the last reset)
    pub fn transitions(&self) -> u32 {
        self.transitions.load(Ordering::Relaxed)
    }

    pub fn reset_transitions(&self) {
        self.transitions.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct NoiseGateParameters {
    enabled: AtomicBool,
    pub threshold_db: Parameter,
    pub attack_ms: Parameter,
    pub hold_ms: Parameter,
    pub release_ms: Parameter,
    pub lookahead_ms: Parameter,
    pub hysteresis_db: Parameter,
    pub rhythm_rate_hz: Parameter,
    pub rhythm_depth: Parameter,
    mode: AtomicChoice<GateMode>,
    pub meter: GateMeter,
}

impl NoiseGateParameters {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            threshold_db: Parameter::new("threshold_db", ranges::noise_gate::THRESHOLD_DB),
            attack_ms: Parameter::new("attack_ms", ranges::noise_gate::ATTACK_MS),
            hold_ms: Parameter::new("hold_ms", ranges::noise_gate::HOLD_MS),
            release_ms: Parameter::new("release_ms", ranges::noise_gate::RELEASE_MS),
            lookahead_ms: Parameter::new("lookahead_ms", ranges::noise_gate::LOOKAHEAD_MS),
            hysteresis_db: Parameter::new("hysteresis_db", ranges::noise_gate::HYSTERESIS_DB),
            rhythm_rate_hz: Parameter::new("rhythm_rate_hz", ranges::noise_gate::RHYTHM_RATE_HZ),
            rhythm_depth: Parameter::new("rhythm_depth", ranges::noise_gate::RHYTHM_DEPTH),
            mode: AtomicChoice::new(GateMode::Normal),
            meter: GateMeter::default(),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_mode(&self, mode: GateMode) {
        self.mode.store(mode);
    }

    pub fn mode(&self) -> GateMode {
        self.mode.load()
    }

    pub fn apply(&self, params: &NoiseGateParams) {
        self.threshold_db.set(params.threshold_db);
        self.attack_ms.set(params.attack_ms);
        self.hold_ms.set(params.hold_ms);
        self.release_ms.set(params.release_ms);
        self.lookahead_ms.set(params.lookahead_ms);
        self.hysteresis_db.set(params.hysteresis_db);
        self.rhythm_rate_hz.set(params.rhythm_rate_hz);
        self.rhythm_depth.set(params.rhythm_depth);
        self.set_mode(params.mode);
        self.set_enabled(params.enabled);
    }

    pub fn snapshot(&self) -> NoiseGateParams {
        NoiseGateParams {
            enabled: self.is_enabled(),
            threshold_db: self.threshold_db.get(),
            attack_ms: self.attack_ms.get(),
            hold_ms: self.hold_ms.get(),
            release_ms: self.release_ms.get(),
            lookahead_ms: self.lookahead_ms.get(),
            hysteresis_db: self.hysteresis_db.get(),
            rhythm_rate_hz: self.rhythm_rate_hz.get(),
            rhythm_depth: self.rhythm_depth.get(),
            mode: self.mode(),
        }
    }
}

impl Default for NoiseGateParameters {
    fn default() -> Self {
        Self::new()
    }
}

pub struct NoiseGate {
    params: Arc<NoiseGateParameters>,
    lifecycle: Lifecycle,
    tracker: ChangeTracker<2>,

    envelope: f32,
    open: bool,
    hold_remaining: usize,
    gain: f32,
    lookahead: [DelayLine; 2],
    lfo: Lfo,

    // Coefficient cache
    detector_release: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl NoiseGate {
    pub fn new() -> Self {
        Self::with_parameters(Arc::new(NoiseGateParameters::new()))
    }

    pub fn with_parameters(params: Arc<NoiseGateParameters>) -> Self {
        Self {
            params,
            lifecycle: Lifecycle::new(),
            tracker: ChangeTracker::new(),
            envelope: 0.0,
            open: false,
            hold_remaining: 0,
            gain: 0.0,
            lookahead: Default::default(),
            lfo: Lfo::new(),
            detector_release: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
        }
    }

    pub fn parameters(&self) -> Arc<NoiseGateParameters> {
        Arc::clone(&self.params)
    }

    pub fn apply_parameters(&self, params: &NoiseGateParams) {
        self.params.apply(params);
    }

    /// Whether the gate is currently open
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn update_coefficients(&mut self, p: &NoiseGateParams) {
        if !self.tracker.update([p.attack_ms, p.release_ms]) {
            return;
        }
        let sr = self.lifecycle.sample_rate();
        let coeff = |ms: f32| (-1.0 / (ms * sr / 1000.0).max(1.0)).exp();
        self.detector_release = coeff(DETECTOR_RELEASE_MS);
        self.attack_coeff = coeff(p.attack_ms);
        self.release_coeff = coeff(p.release_ms);
    }

    /// Advance the open/closed state machine by one sample
    #[inline]
    fn update_state(&mut self, level_db: f32, open_db: f32, close_db: f32, hold: usize) -> bool {
        if self.open {
            if level_db >= close_db {
                self.hold_remaining = hold;
            } else if self.hold_remaining > 0 {
                self.hold_remaining -= 1;
            } else {
                self.open = false;
                return true;
            }
        } else if level_db > open_db {
            self.open = true;
            self.hold_remaining = hold;
            return true;
        }
        false
    }
}

impl Default for NoiseGate {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectUnit for NoiseGate {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.lifecycle.prepare(self.name(), spec);
        let capacity = spec.ms_to_samples(ranges::noise_gate::LOOKAHEAD_MS.max) + 2;
        for line in &mut self.lookahead {
            line.resize(capacity);
        }
        self.tracker.invalidate();
        self.reset();
        self.params.meter.reset_transitions();
    }

    fn process_block(&mut self, buffer: &mut AudioBuffer) {
        if !self.lifecycle.is_prepared() || !self.params.is_enabled() {
            return;
        }

        let p = self.params.snapshot();
        self.update_coefficients(&p);

        let Some(spec) = self.lifecycle.spec() else {
            return;
        };
        let hold = spec.ms_to_samples(p.hold_ms);
        let lookahead = spec.ms_to_samples(p.lookahead_ms);
        self.lfo.set_rate(p.rhythm_rate_hz, spec.sample_rate());

        let open_db = p.threshold_db;
        let close_db = p.threshold_db - p.hysteresis_db;
        let stereo = buffer.num_channels() > 1;

        let mut transitions = 0u32;
        let mut input_peak = 0.0f32;

        let mut lines = std::mem::take(&mut self.lookahead);
        let [left_line, right_line] = &mut lines;

        buffer.for_each_frame(|left, right| {
            let level = if stereo {
                left.abs().max(right.abs())
            } else {
                left.abs()
            };
            input_peak = input_peak.max(level);

            self.envelope = level.max(self.envelope * self.detector_release);
            if self.update_state(gain_to_db(self.envelope), open_db, close_db, hold) {
                transitions += 1;
            }

            let target = match (p.mode, self.open) {
                (GateMode::Normal, open) => f32::from(u8::from(open)),
                (GateMode::Ducking, true) => 1.0 - p.rhythm_depth,
                (GateMode::Ducking, false) => 1.0,
                (GateMode::Rhythmic, true) => {
                    if self.lfo.value(ChorusWaveform::Square, 0.0) > 0.0 {
                        1.0
                    } else {
                        1.0 - p.rhythm_depth
                    }
                }
                (GateMode::Rhythmic, false) => 0.0,
            };
            self.lfo.advance();

            let coeff = if target > self.gain {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain = target + (self.gain - target) * coeff;

            let (dry_l, dry_r) = if lookahead > 0 {
                left_line.push(*left);
                right_line.push(*right);
                (left_line.read(lookahead + 1), right_line.read(lookahead + 1))
            } else {
                (*left, *right)
            };
            *left = dry_l * self.gain;
            *right = dry_r * self.gain;
        });

        self.lookahead = lines;

        let meter = &self.params.meter;
        meter.gate_gain.store(self.gain);
        meter.input_db.store(gain_to_db(input_peak));
        if transitions > 0 {
            meter.transitions.fetch_add(transitions, Ordering::Relaxed);
        }
    }

    fn release(&mut self) {
        self.lifecycle.release(self.name());
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
        self.open = false;
        self.hold_remaining = 0;
        self.gain = 0.0;
        for line in &mut self.lookahead {
            line.clear();
        }
        self.lfo.reset();
    }

    fn is_enabled(&self) -> bool {
        self.params.is_enabled()
    }

    fn state(&self) -> UnitState {
        self.lifecycle.state()
    }

    fn kind(&self) -> BlockKind {
        BlockKind::NoiseGate
    }

    fn name(&self) -> &'static str {
        "NoiseGate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::tests::sine_buffer;
    use crate::primitives::db_to_gain;

    fn prepared(params: &NoiseGateParams) -> NoiseGate {
        let mut gate = NoiseGate::new();
        gate.prepare(&ProcessSpec::new(48_000.0, 4800, 2).unwrap());
        gate.apply_parameters(params);
        gate
    }

    fn base() -> NoiseGateParams {
        NoiseGateParams {
            threshold_db: -40.0,
            attack_ms: 0.5,
            hold_ms: 0.0,
            release_ms: 10.0,
            hysteresis_db: 3.0,
            lookahead_ms: 0.0,
            ..NoiseGateParams::default()
        }
    }

    #[test]
    fn signal_above_threshold_passes() {
        let mut gate = prepared(&base());
        let mut buffer = sine_buffer(500.0, 48_000.0, 4800, db_to_gain(-20.0));
        let original = buffer.clone();
        gate.process_block(&mut buffer);

        let tail = &buffer.channel(0)[2400..];
        let reference = &original.channel(0)[2400..];
        for (a, b) in tail.iter().zip(reference) {
            assert!((a - b).abs() < 1e-3);
        }
        assert!(gate.is_open());
        assert_eq!(gate.parameters().meter.transitions(), 1);
    }

    #[test]
    fn signal_below_threshold_is_muted() {
        let mut gate = prepared(&base());
        let mut buffer = sine_buffer(500.0, 48_000.0, 4800, db_to_gain(-60.0));
        gate.process_block(&mut buffer);
        assert!(buffer.peak() < 1e-6);
        assert!(!gate.is_open());
    }

    #[test]
    fn ducking_attenuates_loud_signal() {
        let mut gate = prepared(&NoiseGateParams {
            mode: GateMode::Ducking,
            rhythm_depth: 0.75,
            ..base()
        });
        let mut buffer = sine_buffer(500.0, 48_000.0, 4800, 0.5);
        gate.process_block(&mut buffer);
        let tail_peak = buffer.channel(0)[2400..]
            .iter()
            .fold(0.0f32, |a, s| a.max(s.abs()));
        assert!((tail_peak - 0.125).abs() < 0.01, "tail peak {tail_peak}");
    }

    #[test]
    fn rhythmic_mode_chops_signal() {
        let mut gate = prepared(&NoiseGateParams {
            mode: GateMode::Rhythmic,
            rhythm_rate_hz: 10.0,
            rhythm_depth: 1.0,
            release_ms: 5.0,
            ..base()
        });
        let mut buffer = sine_buffer(500.0, 48_000.0, 4800, 0.5);
        gate.process_block(&mut buffer);

        // 10 Hz square: second half of each 100 ms cycle is silent
        let ch = buffer.channel(0);
        let loud = ch[500..2000].iter().fold(0.0f32, |a, s| a.max(s.abs()));
        let quiet = ch[4000..4700].iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(loud > 0.4, "loud {loud}");
        assert!(quiet < 0.01, "quiet {quiet}");
    }

    #[test]
    fn hold_keeps_gate_open() {
        let open_after_silence = |hold_ms: f32| {
            let mut gate = prepared(&NoiseGateParams {
                threshold_db: -10.0,
                hysteresis_db: 3.0,
                hold_ms,
                ..base()
            });
            let mut buffer = sine_buffer(500.0, 48_000.0, 4800, 0.5);
            gate.process_block(&mut buffer);
            assert!(gate.is_open());

            // 20 ms of silence: the detector falls below the close threshold
            // after about 8 ms
            let mut silence = AudioBuffer::new(2, 960);
            gate.process_block(&mut silence);
            gate.is_open()
        };
        assert!(open_after_silence(50.0));
        assert!(!open_after_silence(0.0));
    }
}
