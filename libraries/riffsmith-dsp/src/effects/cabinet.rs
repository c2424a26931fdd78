//! Speaker cabinet simulator
//!
//! Convolves with one of three built-in impulse responses, synthesized
//! deterministically at `prepare` for the session rate:
//! - 1x12 open back: bright, short, loose low end
//! - 2x12 open back: fuller low mids
//! - 4x12 closed back: tight low resonance, darker top
//!
//! Post filters add low/high cut and the mic position (on-axis is brighter).
//! `room` blends in a handful of early reflections.

use super::unit::{EffectUnit, Lifecycle, UnitState};
use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::params::{AtomicChoice, ChangeTracker, Choice, Parameter};
use crate::primitives::convolution::{PartitionedConvolver, DEFAULT_BLOCK};
use crate::primitives::{sanitize, Biquad, BiquadCoefficients, DelayLine};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use riffsmith_core::{ranges, BlockKind, CabinetIr, CabinetParams};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Early reflections: (delay ms, gain)
const REFLECTIONS: [(f32, f32); 4] = [(7.0, 0.5), (13.0, 0.35), (19.0, 0.25), (27.0, 0.15)];

/// Mic brightness swing at the axis extremes
const MIC_RANGE_DB: f32 = 6.0;
const MIC_SHELF_HZ: f32 = 2500.0;

/// Shape of a synthetic cabinet response
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CabinetProfile {
    pub seed: u64,
    /// Exponential decay time constant of the noise burst
    pub decay_ms: f32,
    /// Low-end cone resonance
    pub resonance_hz: f32,
    pub resonance_db: f32,
    /// Speaker roll-off
    pub cutoff_hz: f32,
    /// Open backs lose low end below this
    pub low_hz: f32,
}

impl CabinetProfile {
    pub fn for_ir(ir: CabinetIr) -> Self {
        match ir {
            CabinetIr::OneByTwelveOpen => Self {
                seed: 0x112_0,
                decay_ms: 3.0,
                resonance_hz: 110.0,
                resonance_db: 3.0,
                cutoff_hz: 5500.0,
                low_hz: 90.0,
            },
            CabinetIr::TwoByTwelveOpen => Self {
                seed: 0x212_0,
                decay_ms: 4.0,
                resonance_hz: 95.0,
                resonance_db: 4.5,
                cutoff_hz: 5000.0,
                low_hz: 75.0,
            },
            CabinetIr::FourByTwelveClosed => Self {
                seed: 0x412_c,
                decay_ms: 5.5,
                resonance_hz: 85.0,
                resonance_db: 7.0,
                cutoff_hz: 4200.0,
                low_hz: 60.0,
            },
        }
    }
}

/// Synthesize an impulse response of `length` samples
///
/// Exponentially decaying seeded noise shaped by the profile's filters,
/// normalised to unit energy.
pub fn synthesize_ir(ir: CabinetIr, sample_rate: f32, length: usize) -> Vec<f32> {
    let profile = CabinetProfile::for_ir(ir);
    let mut rng = StdRng::seed_from_u64(profile.seed);
    let tau = (profile.decay_ms * sample_rate / 1000.0).max(1.0);

    let mut response: Vec<f32> = (0..length.max(1))
        .map(|n| rng.gen_range(-1.0f32..1.0) * (-(n as f32) / tau).exp())
        .collect();

    let mut filters = [
        Biquad::new(BiquadCoefficients::high_pass(sample_rate, profile.low_hz, 0.707)),
        Biquad::new(BiquadCoefficients::peaking(
            sample_rate,
            profile.resonance_hz,
            1.2,
            profile.resonance_db,
        )),
        Biquad::new(BiquadCoefficients::peaking(sample_rate, 2500.0, 1.0, 3.0)),
        Biquad::new(BiquadCoefficients::low_pass(sample_rate, profile.cutoff_hz, 0.707)),
        Biquad::new(BiquadCoefficients::low_pass(sample_rate, profile.cutoff_hz, 0.707)),
    ];
    for sample in &mut response {
        for filter in &mut filters {
            *sample = filter.process(*sample);
        }
    }

    let energy: f32 = response.iter().map(|s| s * s).sum();
    if energy > 0.0 {
        let norm = energy.sqrt().recip();
        for sample in &mut response {
            *sample *= norm;
        }
    }
    response
}

#[derive(Debug)]
pub struct CabinetParameters {
    enabled: AtomicBool,
    pub low_cut_hz: Parameter,
    pub high_cut_hz: Parameter,
    pub mic_position: Parameter,
    pub room: Parameter,
    pub ir_length_ms: Parameter,
    ir: AtomicChoice<CabinetIr>,
}

impl CabinetParameters {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            low_cut_hz: Parameter::new("low_cut_hz", ranges::cabinet::LOW_CUT_HZ),
            high_cut_hz: Parameter::new("high_cut_hz", ranges::cabinet::HIGH_CUT_HZ),
            mic_position: Parameter::new("mic_position", ranges::cabinet::MIC_POSITION),
            room: Parameter::new("room", ranges::cabinet::ROOM),
            ir_length_ms: Parameter::new("ir_length_ms", ranges::cabinet::IR_LENGTH_MS),
            ir: AtomicChoice::new(CabinetIr::OneByTwelveOpen),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_ir(&self, ir: CabinetIr) {
        self.ir.store(ir);
    }

    pub fn ir(&self) -> CabinetIr {
        self.ir.load()
    }

    pub fn apply(&self, params: &CabinetParams) {
        self.low_cut_hz.set(params.low_cut_hz);
        self.high_cut_hz.set(params.high_cut_hz);
        self.mic_position.set(params.mic_position);
        self.room.set(params.room);
        self.ir_length_ms.set(params.ir_length_ms);
        self.set_ir(params.ir);
        self.set_enabled(params.enabled);
    }

    pub fn snapshot(&self) -> CabinetParams {
        CabinetParams {
            enabled: self.is_enabled(),
            low_cut_hz: self.low_cut_hz.get(),
            high_cut_hz: self.high_cut_hz.get(),
            mic_position: self.mic_position.get(),
            room: self.room.get(),
            ir_length_ms: self.ir_length_ms.get(),
            ir: self.ir(),
        }
    }
}

impl Default for CabinetParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-channel post processing
#[derive(Debug, Clone, Default)]
struct PostChain {
    low_cut: Biquad,
    high_cut: Biquad,
    mic: Biquad,
    reflections: DelayLine,
}

impl PostChain {
    fn reset(&mut self) {
        self.low_cut.reset();
        self.high_cut.reset();
        self.mic.reset();
        self.reflections.clear();
    }
}

pub struct CabinetSimulator {
    params: Arc<CabinetParameters>,
    lifecycle: Lifecycle,
    tracker: ChangeTracker<5>,
    convolver: Option<PartitionedConvolver>,
    post: [PostChain; 2],
    reflection_taps: [usize; 4],
}

impl CabinetSimulator {
    pub fn new() -> Self {
        Self::with_parameters(Arc::new(CabinetParameters::new()))
    }

    pub fn with_parameters(params: Arc<CabinetParameters>) -> Self {
        Self {
            params,
            lifecycle: Lifecycle::new(),
            tracker: ChangeTracker::new(),
            convolver: None,
            post: Default::default(),
            reflection_taps: [1; 4],
        }
    }

    pub fn parameters(&self) -> Arc<CabinetParameters> {
        Arc::clone(&self.params)
    }

    pub fn apply_parameters(&self, params: &CabinetParams) {
        self.params.apply(params);
    }

    /// Convolution latency in samples (0 before `prepare`)
    pub fn latency(&self) -> usize {
        self.convolver.as_ref().map_or(0, PartitionedConvolver::latency)
    }

    fn update_coefficients(&mut self, p: &CabinetParams) {
        if !self.tracker.update([
            p.low_cut_hz,
            p.high_cut_hz,
            p.mic_position,
            p.ir_length_ms,
            f32::from(self.params.ir.load_index()),
        ]) {
            return;
        }

        let Some(spec) = self.lifecycle.spec() else {
            return;
        };
        let sr = spec.sample_rate();
        let low = BiquadCoefficients::high_pass(sr, p.low_cut_hz, 0.707);
        let high = BiquadCoefficients::low_pass(sr, p.high_cut_hz, 0.707);
        // 0 = on-axis (bright), 1 = off-axis (dark)
        let mic_db = (0.5 - p.mic_position) * 2.0 * MIC_RANGE_DB;
        let mic = BiquadCoefficients::high_shelf(sr, MIC_SHELF_HZ, 0.707, mic_db);
        for chain in &mut self.post {
            chain.low_cut.set_coefficients(low);
            chain.high_cut.set_coefficients(high);
            chain.mic.set_coefficients(mic);
        }

        if let Some(convolver) = self.convolver.as_mut() {
            let ir_index = usize::from(self.params.ir.load_index());
            convolver.select(ir_index, spec.ms_to_samples(p.ir_length_ms));
        }
    }
}

impl Default for CabinetSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectUnit for CabinetSimulator {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.lifecycle.prepare(self.name(), spec);

        let length = spec.ms_to_samples(ranges::cabinet::IR_LENGTH_MS.max);
        let responses: Vec<Vec<f32>> = CabinetIr::VARIANTS
            .iter()
            .map(|&ir| synthesize_ir(ir, spec.sample_rate(), length))
            .collect();
        debug!(
            irs = responses.len(),
            length, "Synthesized cabinet impulse responses"
        );
        self.convolver = Some(PartitionedConvolver::new(
            DEFAULT_BLOCK,
            &responses,
            spec.num_channels(),
        ));

        let max_reflection = REFLECTIONS.iter().fold(0.0f32, |a, (ms, _)| a.max(*ms));
        for chain in &mut self.post {
            chain.reflections.resize(spec.ms_to_samples(max_reflection) + 2);
        }
        for (tap, (ms, _)) in self.reflection_taps.iter_mut().zip(REFLECTIONS) {
            *tap = spec.ms_to_samples(ms).max(1);
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

        let Some(convolver) = self.convolver.as_mut() else {
            return;
        };
        let taps = self.reflection_taps;

        for (index, (samples, chain)) in buffer
            .channels_mut()
            .zip(self.post.iter_mut())
            .enumerate()
        {
            for sample in samples.iter_mut() {
                let cab = convolver.process_sample(index, *sample);
                chain.reflections.push(cab);
                let early: f32 = taps
                    .iter()
                    .zip(REFLECTIONS)
                    .map(|(&tap, (_, gain))| chain.reflections.read(tap + 1) * gain)
                    .sum();
                let x = cab + early * p.room;
                let x = chain.high_cut.process(chain.low_cut.process(x));
                *sample = sanitize(chain.mic.process(x));
            }
        }
    }

    fn release(&mut self) {
        self.lifecycle.release(self.name());
        self.convolver = None;
    }

    fn reset(&mut self) {
        if let Some(convolver) = self.convolver.as_mut() {
            convolver.reset();
        }
        for chain in &mut self.post {
            chain.reset();
        }
    }

    fn is_enabled(&self) -> bool {
        self.params.is_enabled()
    }

    fn state(&self) -> UnitState {
        self.lifecycle.state()
    }

    fn kind(&self) -> BlockKind {
        BlockKind::Cab
    }

    fn name(&self) -> &'static str {
        "CabinetSimulator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::tests::sine_buffer;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn run(freq: f32, params: &CabinetParams) -> f32 {
        let mut cab = CabinetSimulator::new();
        cab.prepare(&ProcessSpec::new(48_000.0, 9600, 2).unwrap());
        cab.apply_parameters(params);
        let mut buffer = sine_buffer(freq, 48_000.0, 9600, 0.5);
        cab.process_block(&mut buffer);
        rms(&buffer.channel(0)[4800..])
    }

    #[test]
    fn synthesis_is_deterministic() {
        let a = synthesize_ir(CabinetIr::FourByTwelveClosed, 48_000.0, 2048);
        let b = synthesize_ir(CabinetIr::FourByTwelveClosed, 48_000.0, 2048);
        assert_eq!(a, b);
        let energy: f32 = a.iter().map(|s| s * s).sum();
        assert!((energy - 1.0).abs() < 1e-3);
    }

    #[test]
    fn models_differ() {
        let a = synthesize_ir(CabinetIr::OneByTwelveOpen, 48_000.0, 1024);
        let b = synthesize_ir(CabinetIr::FourByTwelveClosed, 48_000.0, 1024);
        assert_ne!(a, b);
    }

    #[test]
    fn cabinet_rolls_off_highs() {
        let params = CabinetParams {
            room: 0.0,
            mic_position: 0.5,
            ..CabinetParams::default()
        };
        let mid = run(800.0, &params);
        let top = run(12_000.0, &params);
        assert!(mid > 0.01, "mid {mid}");
        assert!(top < mid * 0.1, "mid {mid}, top {top}");
    }

    #[test]
    fn off_axis_is_darker() {
        let on_axis = run(
            4000.0,
            &CabinetParams {
                mic_position: 0.0,
                ..CabinetParams::default()
            },
        );
        let off_axis = run(
            4000.0,
            &CabinetParams {
                mic_position: 1.0,
                ..CabinetParams::default()
            },
        );
        assert!(off_axis < on_axis);
    }

    #[test]
    fn release_drops_convolver() {
        let mut cab = CabinetSimulator::new();
        cab.prepare(&ProcessSpec::new(44_100.0, 256, 2).unwrap());
        assert_eq!(cab.latency(), DEFAULT_BLOCK);
        cab.release();
        assert_eq!(cab.latency(), 0);

        let mut buffer = sine_buffer(440.0, 44_100.0, 256, 0.5);
        let original = buffer.clone();
        cab.process_block(&mut buffer);
        assert_eq!(buffer, original);
    }
}
