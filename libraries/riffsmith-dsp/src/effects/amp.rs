//! Guitar amplifier simulator
//!
//! Preamp gain into a model-specific tube curve (oversampled 2x), a passive
//! style tone stack, a soft power-amp stage and the master volume.

use super::unit::{EffectUnit, Lifecycle, UnitState};
use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::params::{AtomicChoice, ChangeTracker, Parameter};
use crate::primitives::{
    sanitize, saturation, Biquad, BiquadCoefficients, DcBlocker, Oversampler,
};
use riffsmith_core::{ranges, AmpModel, AmpParams, BlockKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const OVERSAMPLE: u32 = 2;

/// Tone-stack gain at a control extreme
const STACK_RANGE_DB: f32 = 12.0;
const PRESENCE_RANGE_DB: f32 = 8.0;

const BASS_HZ: f32 = 100.0;
const TREBLE_HZ: f32 = 3200.0;
const PRESENCE_HZ: f32 = 6000.0;

/// Per-model voicing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voicing {
    /// Preamp gain at `gain = 1.0`
    pub max_drive: f32,
    /// Centre of the mid control
    pub mid_hz: f32,
    /// Width of the mid control
    pub mid_q: f32,
}

impl Voicing {
    pub fn for_model(model: AmpModel) -> Self {
        match model {
            AmpModel::CleanBlackface => Self {
                max_drive: 4.0,
                mid_hz: 500.0,
                mid_q: 0.7,
            },
            AmpModel::JanglyVox => Self {
                max_drive: 10.0,
                mid_hz: 800.0,
                mid_q: 0.9,
            },
            AmpModel::BritCrunch => Self {
                max_drive: 20.0,
                mid_hz: 650.0,
                mid_q: 0.8,
            },
            AmpModel::HiGain => Self {
                max_drive: 60.0,
                mid_hz: 750.0,
                mid_q: 1.0,
            },
        }
    }
}

#[derive(Debug)]
pub struct AmpParameters {
    enabled: AtomicBool,
    pub gain: Parameter,
    pub bass: Parameter,
    pub mid: Parameter,
    pub treble: Parameter,
    pub presence: Parameter,
    pub master: Parameter,
    model: AtomicChoice<AmpModel>,
}

impl AmpParameters {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            gain: Parameter::new("gain", ranges::amp::GAIN),
            bass: Parameter::new("bass", ranges::amp::BASS),
            mid: Parameter::new("mid", ranges::amp::MID),
            treble: Parameter::new("treble", ranges::amp::TREBLE),
            presence: Parameter::new("presence", ranges::amp::PRESENCE),
            master: Parameter::new("master", ranges::amp::MASTER),
            model: AtomicChoice::new(AmpModel::CleanBlackface),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_model(&self, model: AmpModel) {
        self.model.store(model);
    }

    pub fn model(&self) -> AmpModel {
        self.model.load()
    }

    pub fn apply(&self, params: &AmpParams) {
        self.gain.set(params.gain);
        self.bass.set(params.bass);
        self.mid.set(params.mid);
        self.treble.set(params.treble);
        self.presence.set(params.presence);
        self.master.set(params.master);
        self.set_model(params.model);
        self.set_enabled(params.enabled);
    }

    pub fn snapshot(&self) -> AmpParams {
        AmpParams {
            enabled: self.is_enabled(),
            gain: self.gain.get(),
            bass: self.bass.get(),
            mid: self.mid.get(),
            treble: self.treble.get(),
            presence: self.presence.get(),
            master: self.master.get(),
            model: self.model(),
        }
    }
}

impl Default for AmpParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-channel signal path
#[derive(Debug, Clone, Default)]
struct AmpChannel {
    oversampler: Oversampler,
    dc_blocker: DcBlocker,
    stack: [Biquad; 4],
}

impl AmpChannel {
    fn reset(&mut self) {
        self.oversampler.reset();
        self.dc_blocker.reset();
        for filter in &mut self.stack {
            filter.reset();
        }
    }
}

pub struct AmpSimulator {
    params: Arc<AmpParameters>,
    lifecycle: Lifecycle,
    tracker: ChangeTracker<5>,
    channels: [AmpChannel; 2],
    pre_gain: f32,
    model: AmpModel,
}

impl AmpSimulator {
    pub fn new() -> Self {
        Self::with_parameters(Arc::new(AmpParameters::new()))
    }

    pub fn with_parameters(params: Arc<AmpParameters>) -> Self {
        Self {
            params,
            lifecycle: Lifecycle::new(),
            tracker: ChangeTracker::new(),
            channels: Default::default(),
            pre_gain: 1.0,
            model: AmpModel::CleanBlackface,
        }
    }

    pub fn parameters(&self) -> Arc<AmpParameters> {
        Arc::clone(&self.params)
    }

    pub fn apply_parameters(&self, params: &AmpParams) {
        self.params.apply(params);
    }

    fn update_coefficients(&mut self, p: &AmpParams) {
        if !self.tracker.update([
            p.bass,
            p.mid,
            p.treble,
            p.presence,
            f32::from(self.params.model.load_index()),
        ]) {
            return;
        }

        let sr = self.lifecycle.sample_rate();
        let voicing = Voicing::for_model(p.model);
        let centred = |v: f32| (v - 0.5) * 2.0;

        let stack = [
            BiquadCoefficients::low_shelf(sr, BASS_HZ, 0.707, centred(p.bass) * STACK_RANGE_DB),
            BiquadCoefficients::peaking(
                sr,
                voicing.mid_hz,
                voicing.mid_q,
                centred(p.mid) * STACK_RANGE_DB,
            ),
            BiquadCoefficients::high_shelf(
                sr,
                TREBLE_HZ,
                0.707,
                centred(p.treble) * STACK_RANGE_DB,
            ),
            BiquadCoefficients::high_shelf(
                sr,
                PRESENCE_HZ,
                0.707,
                centred(p.presence) * PRESENCE_RANGE_DB,
            ),
        ];
        for channel in &mut self.channels {
            for (filter, coeffs) in channel.stack.iter_mut().zip(stack) {
                filter.set_coefficients(coeffs);
            }
        }
        self.model = p.model;
    }
}

impl Default for AmpSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectUnit for AmpSimulator {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.lifecycle.prepare(self.name(), spec);
        for channel in &mut self.channels {
            channel.oversampler.prepare(spec.sample_rate(), OVERSAMPLE);
            channel.dc_blocker.prepare(spec.sample_rate());
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

        self.pre_gain = 1.0 + p.gain * Voicing::for_model(p.model).max_drive;
        let pre_gain = self.pre_gain;
        let model = self.model;
        let master = p.master;

        for (samples, channel) in buffer.channels_mut().zip(self.channels.iter_mut()) {
            for sample in samples.iter_mut() {
                let driven = channel
                    .oversampler
                    .process(*sample * pre_gain, |x| saturation::amp_curve(model, x));
                let mut x = channel.dc_blocker.process(driven);
                for filter in &mut channel.stack {
                    x = filter.process(x);
                }
                *sample = sanitize(saturation::soft_clip(x) * master);
            }
        }
    }

    fn release(&mut self) {
        self.lifecycle.release(self.name());
    }

    fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }

    fn is_enabled(&self) -> bool {
        self.params.is_enabled()
    }

    fn state(&self) -> UnitState {
        self.lifecycle.state()
    }

    fn kind(&self) -> BlockKind {
        BlockKind::Amp
    }

    fn name(&self) -> &'static str {
        "AmpSimulator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::tests::sine_buffer;

    fn crest_factor(samples: &[f32]) -> f32 {
        let peak = samples.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        let rms = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
        peak / rms
    }

    fn run(model: AmpModel, gain: f32) -> AudioBuffer {
        let mut amp = AmpSimulator::new();
        amp.prepare(&ProcessSpec::new(48_000.0, 4800, 2).unwrap());
        amp.apply_parameters(&AmpParams {
            model,
            gain,
            bass: 0.5,
            mid: 0.5,
            treble: 0.5,
            presence: 0.5,
            master: 1.0,
            ..AmpParams::default()
        });
        let mut buffer = sine_buffer(220.0, 48_000.0, 4800, 0.3);
        amp.process_block(&mut buffer);
        buffer
    }

    #[test]
    fn output_is_bounded_by_master() {
        for model in [
            AmpModel::CleanBlackface,
            AmpModel::JanglyVox,
            AmpModel::BritCrunch,
            AmpModel::HiGain,
        ] {
            let buffer = run(model, 1.0);
            assert!(buffer.peak() <= 1.0, "{model:?} peak {}", buffer.peak());
            assert!(buffer.as_slice().iter().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn high_gain_squares_up_the_wave() {
        // A sine has a crest factor of ~1.41; clipping pushes it toward 1.0
        let clean = run(AmpModel::CleanBlackface, 0.0);
        let dirty = run(AmpModel::HiGain, 1.0);
        let clean_crest = crest_factor(&clean.channel(0)[2400..]);
        let dirty_crest = crest_factor(&dirty.channel(0)[2400..]);
        assert!(dirty_crest < clean_crest, "clean {clean_crest}, dirty {dirty_crest}");
    }

    #[test]
    fn voicings_scale_gain() {
        let clean = Voicing::for_model(AmpModel::CleanBlackface);
        let high = Voicing::for_model(AmpModel::HiGain);
        assert!(high.max_drive > clean.max_drive);
    }
}
