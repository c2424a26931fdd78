//! Chorus / flanger
//!
//! One LFO-modulated delay per channel. Negative feedback with a short base
//! delay turns the unit into a flanger. `spread` offsets the right channel's
//! LFO phase by up to a quarter cycle.

use super::unit::{EffectUnit, Lifecycle, UnitState};
use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::params::{AtomicChoice, Parameter};
use crate::primitives::{mix_dry_wet, sanitize, DelayLine, Lfo};
use riffsmith_core::{ranges, BlockKind, ChorusParams, ChorusWaveform};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Modulation excursion at depth 1.0
const MAX_MOD_MS: f32 = 10.0;

#[derive(Debug)]
pub struct ChorusParameters {
    enabled: AtomicBool,
    pub rate_hz: Parameter,
    pub depth: Parameter,
    pub mix: Parameter,
    pub feedback: Parameter,
    pub base_delay_ms: Parameter,
    pub spread: Parameter,
    waveform: AtomicChoice<ChorusWaveform>,
}

impl ChorusParameters {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            rate_hz: Parameter::new("rate_hz", ranges::chorus::RATE_HZ),
            depth: Parameter::new("depth", ranges::chorus::DEPTH),
            mix: Parameter::new("mix", ranges::chorus::MIX),
            feedback: Parameter::new("feedback", ranges::chorus::FEEDBACK),
            base_delay_ms: Parameter::new("base_delay_ms", ranges::chorus::BASE_DELAY_MS),
            spread: Parameter::new("spread", ranges::chorus::SPREAD),
            waveform: AtomicChoice::new(ChorusWaveform::Sine),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_waveform(&self, waveform: ChorusWaveform) {
        self.waveform.store(waveform);
    }

    pub fn waveform(&self) -> ChorusWaveform {
        self.waveform.load()
    }

    pub fn apply(&self, params: &ChorusParams) {
        self.rate_hz.set(params.rate_hz);
        self.depth.set(params.depth);
        self.mix.set(params.mix);
        self.feedback.set(params.feedback);
        self.base_delay_ms.set(params.base_delay_ms);
        self.spread.set(params.spread);
        self.set_waveform(params.waveform);
        self.set_enabled(params.enabled);
    }

    pub fn snapshot(&self) -> ChorusParams {
        ChorusParams {
            enabled: self.is_enabled(),
            rate_hz: self.rate_hz.get(),
            depth: self.depth.get(),
            mix: self.mix.get(),
            feedback: self.feedback.get(),
            base_delay_ms: self.base_delay_ms.get(),
            spread: self.spread.get(),
            waveform: self.waveform(),
        }
    }
}

impl Default for ChorusParameters {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Chorus {
    params: Arc<ChorusParameters>,
    lifecycle: Lifecycle,
    lines: [DelayLine; 2],
    lfo: Lfo,
}

impl Chorus {
    pub fn new() -> Self {
        Self::with_parameters(Arc::new(ChorusParameters::new()))
    }

    pub fn with_parameters(params: Arc<ChorusParameters>) -> Self {
        Self {
            params,
            lifecycle: Lifecycle::new(),
            lines: Default::default(),
            lfo: Lfo::new(),
        }
    }

    pub fn parameters(&self) -> Arc<ChorusParameters> {
        Arc::clone(&self.params)
    }

    pub fn apply_parameters(&self, params: &ChorusParams) {
        self.params.apply(params);
    }
}

impl Default for Chorus {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectUnit for Chorus {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.lifecycle.prepare(self.name(), spec);
        let max_ms = ranges::chorus::BASE_DELAY_MS.max + MAX_MOD_MS;
        let capacity = spec.ms_to_samples(max_ms) + 4;
        for line in &mut self.lines {
            line.resize(capacity);
        }
        self.lfo.reset();
    }

    fn process_block(&mut self, buffer: &mut AudioBuffer) {
        if !self.lifecycle.is_prepared() || !self.params.is_enabled() {
            return;
        }

        let p = self.params.snapshot();
        let sample_rate = self.lifecycle.sample_rate();
        let samples_per_ms = sample_rate / 1000.0;
        self.lfo.set_rate(p.rate_hz, sample_rate);

        let base = p.base_delay_ms * samples_per_ms;
        let excursion = p.depth * MAX_MOD_MS * samples_per_ms;
        let offsets = [0.0, p.spread * 0.25];

        let [left_line, right_line] = &mut self.lines;
        let lfo = &mut self.lfo;

        buffer.for_each_frame(|left, right| {
            for ((sample, line), offset) in [&mut *left, &mut *right]
                .into_iter()
                .zip([&mut *left_line, &mut *right_line])
                .zip(offsets)
            {
                let modulation = 0.5 * (1.0 + lfo.value(p.waveform, offset));
                let wet = line.read_fractional(base + excursion * modulation);
                line.push(sanitize(*sample + wet * p.feedback));
                *sample = mix_dry_wet(*sample, wet, p.mix);
            }
            lfo.advance();
        });
    }

    fn release(&mut self) {
        self.lifecycle.release(self.name());
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
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
        BlockKind::Chorus
    }

    fn name(&self) -> &'static str {
        "Chorus"
    }
}
