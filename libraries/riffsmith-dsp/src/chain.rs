//! The guitar signal chain
//!
//! Fixed topology, processed in this order:
//!
//! ```text
//! NoiseGate -> Gain -> Tone -> Compressor -> Drive -> AmpSimulator
//!   -> CabinetSimulator -> Chorus -> Delay -> Reverb -> Equalizer
//! ```
//!
//! Gain (0-2, ramped over 50 ms) and Tone (low-pass 500 Hz - 8 kHz) are
//! chain-level controls; every other stage is an [`EffectUnit`] with its own
//! parameter handle. All units start disabled; a preset enables the ones it
//! lists.
//!
//! Control threads talk to the chain through a [`ChainHandle`], which only
//! ever touches atomics.

use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::effects::{
    AmpParameters, AmpSimulator, CabinetParameters, CabinetSimulator, Chorus, ChorusParameters,
    Compressor, CompressorParameters, Delay, DelayParameters, Drive, DriveParameters,
    EffectUnit, EqParameters, Equalizer, NoiseGate, NoiseGateParameters, Reverb,
    ReverbParameters,
};
use crate::error::Result;
use crate::params::{ChangeTracker, Parameter};
use crate::primitives::{Biquad, BiquadCoefficients};
use crate::smoothing::LinearRamp;
use riffsmith_core::{ranges, BlockKind, EffectBlock, PresetData};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Glide time of the chain gain
const GAIN_RAMP_MS: f32 = 50.0;

const TONE_MIN_HZ: f32 = 500.0;
const TONE_SPAN_HZ: f32 = 7500.0;
const TONE_Q: f32 = 0.707;

/// Low-pass cutoff of the chain tone control
#[inline]
pub fn tone_cutoff_hz(tone: f32) -> f32 {
    TONE_MIN_HZ + TONE_SPAN_HZ * tone.clamp(0.0, 1.0)
}

/// Bypass state of the whole chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassState {
    Active,
    Bypassed,
}

/// Chain-level atomics
#[derive(Debug)]
pub struct ChainParameters {
    bypass: AtomicBool,
    /// Off when an outer smoother already glides the gain
    gain_glide: AtomicBool,
    pub gain: Parameter,
    pub tone: Parameter,
}

impl ChainParameters {
    pub fn new() -> Self {
        Self {
            bypass: AtomicBool::new(false),
            gain_glide: AtomicBool::new(true),
            gain: Parameter::new("gain", ranges::chain::GAIN),
            tone: Parameter::new("tone", ranges::chain::TONE),
        }
    }

    pub fn set_bypass(&self, state: BypassState) {
        self.bypass
            .store(state == BypassState::Bypassed, Ordering::Relaxed);
    }

    pub fn bypass(&self) -> BypassState {
        if self.bypass.load(Ordering::Relaxed) {
            BypassState::Bypassed
        } else {
            BypassState::Active
        }
    }

    pub fn set_gain_glide(&self, enabled: bool) {
        self.gain_glide.store(enabled, Ordering::Relaxed);
    }

    pub fn gain_glide(&self) -> bool {
        self.gain_glide.load(Ordering::Relaxed)
    }
}

impl Default for ChainParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable control-side view of a [`DspChain`]
#[derive(Debug, Clone)]
pub struct ChainHandle {
    chain: Arc<ChainParameters>,
    gate: Arc<NoiseGateParameters>,
    compressor: Arc<CompressorParameters>,
    drive: Arc<DriveParameters>,
    amp: Arc<AmpParameters>,
    cabinet: Arc<CabinetParameters>,
    chorus: Arc<ChorusParameters>,
    delay: Arc<DelayParameters>,
    reverb: Arc<ReverbParameters>,
    eq: Arc<EqParameters>,
}

impl ChainHandle {
    pub fn set_gain(&self, gain: f32) {
        self.chain.gain.set(gain);
    }

    pub fn gain(&self) -> f32 {
        self.chain.gain.get()
    }

    pub fn set_tone(&self, tone: f32) {
        self.chain.tone.set(tone);
    }

    pub fn tone(&self) -> f32 {
        self.chain.tone.get()
    }

    /// Takes effect at the next block boundary
    pub fn set_bypass(&self, state: BypassState) {
        self.chain.set_bypass(state);
    }

    pub fn bypass(&self) -> BypassState {
        self.chain.bypass()
    }

    /// Choose how a gain change is applied
    ///
    /// With the glide on (the default) the gain moves over 50 ms. With it
    /// off, each new value is reached by the end of the block it arrives
    /// in, for callers that already ramp the gain at block rate.
    pub fn set_gain_glide(&self, enabled: bool) {
        self.chain.set_gain_glide(enabled);
    }

    pub fn chain(&self) -> &ChainParameters {
        &self.chain
    }

    pub fn noise_gate(&self) -> &NoiseGateParameters {
        &self.gate
    }

    pub fn compressor(&self) -> &CompressorParameters {
        &self.compressor
    }

    pub fn drive(&self) -> &DriveParameters {
        &self.drive
    }

    pub fn amp(&self) -> &AmpParameters {
        &self.amp
    }

    pub fn cabinet(&self) -> &CabinetParameters {
        &self.cabinet
    }

    pub fn chorus(&self) -> &ChorusParameters {
        &self.chorus
    }

    pub fn delay(&self) -> &DelayParameters {
        &self.delay
    }

    pub fn reverb(&self) -> &ReverbParameters {
        &self.reverb
    }

    pub fn eq(&self) -> &EqParameters {
        &self.eq
    }

    pub fn set_unit_enabled(&self, kind: BlockKind, enabled: bool) {
        match kind {
            BlockKind::NoiseGate => self.gate.set_enabled(enabled),
            BlockKind::Compressor => self.compressor.set_enabled(enabled),
            BlockKind::Drive => self.drive.set_enabled(enabled),
            BlockKind::Amp => self.amp.set_enabled(enabled),
            BlockKind::Cab => self.cabinet.set_enabled(enabled),
            BlockKind::Chorus => self.chorus.set_enabled(enabled),
            BlockKind::Delay => self.delay.set_enabled(enabled),
            BlockKind::Reverb => self.reverb.set_enabled(enabled),
            BlockKind::Eq => self.eq.set_enabled(enabled),
        }
    }

    pub fn is_unit_enabled(&self, kind: BlockKind) -> bool {
        match kind {
            BlockKind::NoiseGate => self.gate.is_enabled(),
            BlockKind::Compressor => self.compressor.is_enabled(),
            BlockKind::Drive => self.drive.is_enabled(),
            BlockKind::Amp => self.amp.is_enabled(),
            BlockKind::Cab => self.cabinet.is_enabled(),
            BlockKind::Chorus => self.chorus.is_enabled(),
            BlockKind::Delay => self.delay.is_enabled(),
            BlockKind::Reverb => self.reverb.is_enabled(),
            BlockKind::Eq => self.eq.is_enabled(),
        }
    }

    /// Push one preset block into its unit (including its enabled flag)
    pub fn apply_block(&self, block: &EffectBlock) {
        match block {
            EffectBlock::NoiseGate(p) => self.gate.apply(p),
            EffectBlock::Compressor(p) => self.compressor.apply(p),
            EffectBlock::Drive(p) => self.drive.apply(p),
            EffectBlock::Amp(p) => self.amp.apply(p),
            EffectBlock::Cab(p) => self.cabinet.apply(p),
            EffectBlock::Chorus(p) => self.chorus.apply(p),
            EffectBlock::Delay(p) => self.delay.apply(p),
            EffectBlock::Reverb(p) => self.reverb.apply(p),
            EffectBlock::Eq(p) => self.eq.apply(p),
        }
    }

    /// Map every block of a preset onto its unit
    ///
    /// Units whose block is absent are disabled. When a preset lists a kind
    /// twice, the first occurrence wins.
    pub fn apply_preset(&self, preset: &PresetData) {
        for kind in BlockKind::ALL {
            match preset.block(kind) {
                Some(block) => self.apply_block(block),
                None => self.set_unit_enabled(kind, false),
            }
        }
        debug!(
            preset = %preset.name,
            blocks = preset.chain.len(),
            "Applied preset to chain"
        );
    }
}

/// Guitar DSP chain (audio thread side)
pub struct DspChain {
    params: Arc<ChainParameters>,
    spec: Option<ProcessSpec>,

    gate: NoiseGate,
    compressor: Compressor,
    drive: Drive,
    amp: AmpSimulator,
    cabinet: CabinetSimulator,
    chorus: Chorus,
    delay: Delay,
    reverb: Reverb,
    eq: Equalizer,

    gain_ramp: LinearRamp,
    gain_ramp_samples: u32,
    tone_tracker: ChangeTracker<1>,
    tone_filters: [Biquad; 2],
}

impl DspChain {
    /// Create a chain with every unit disabled
    pub fn new() -> Self {
        let params = Arc::new(ChainParameters::new());
        let chain = Self {
            gain_ramp: LinearRamp::new(params.gain.get()),
            params,
            spec: None,
            gate: NoiseGate::new(),
            compressor: Compressor::new(),
            drive: Drive::new(),
            amp: AmpSimulator::new(),
            cabinet: CabinetSimulator::new(),
            chorus: Chorus::new(),
            delay: Delay::new(),
            reverb: Reverb::new(),
            eq: Equalizer::new(),
            gain_ramp_samples: 0,
            tone_tracker: ChangeTracker::new(),
            tone_filters: Default::default(),
        };

        let handle = chain.handle();
        for kind in BlockKind::ALL {
            handle.set_unit_enabled(kind, false);
        }
        chain
    }

    /// Control-side handle sharing this chain's atomics
    pub fn handle(&self) -> ChainHandle {
        ChainHandle {
            chain: Arc::clone(&self.params),
            gate: self.gate.parameters(),
            compressor: self.compressor.parameters(),
            drive: self.drive.parameters(),
            amp: self.amp.parameters(),
            cabinet: self.cabinet.parameters(),
            chorus: self.chorus.parameters(),
            delay: self.delay.parameters(),
            reverb: self.reverb.parameters(),
            eq: self.eq.parameters(),
        }
    }

    /// Validate the processing configuration and prepare every unit
    ///
    /// May be called again at a new rate; all history is cleared.
    pub fn prepare_to_play(
        &mut self,
        sample_rate: f32,
        block_size: usize,
        num_channels: usize,
    ) -> Result<()> {
        let spec = ProcessSpec::new(sample_rate, block_size, num_channels)?;

        self.gate.prepare(&spec);
        for unit in self.post_tone_units() {
            unit.prepare(&spec);
        }

        self.gain_ramp_samples = spec.ms_to_samples(GAIN_RAMP_MS) as u32;
        self.gain_ramp.set_immediate(self.params.gain.get());
        self.tone_tracker.invalidate();
        for filter in &mut self.tone_filters {
            filter.reset();
        }
        self.spec = Some(spec);

        info!(
            sample_rate,
            block_size, num_channels, "Guitar chain prepared"
        );
        Ok(())
    }

    /// Process one block in place
    ///
    /// A bypassed or unprepared chain returns without touching the buffer.
    pub fn process_block(&mut self, buffer: &mut AudioBuffer) {
        if self.params.bypass() == BypassState::Bypassed {
            return;
        }
        let Some(spec) = self.spec else {
            return;
        };

        self.gate.process_block(buffer);
        self.process_gain_and_tone(&spec, buffer);
        for unit in self.post_tone_units() {
            unit.process_block(buffer);
        }
    }

    /// Drop every unit's prepared resources
    pub fn release(&mut self) {
        if self.spec.take().is_some() {
            debug!("Releasing guitar chain");
        }
        self.gate.release();
        for unit in self.post_tone_units() {
            unit.release();
        }
    }

    /// Clear all history, keep buffers
    pub fn reset(&mut self) {
        self.gate.reset();
        for unit in self.post_tone_units() {
            unit.reset();
        }
        for filter in &mut self.tone_filters {
            filter.reset();
        }
        self.gain_ramp.set_immediate(self.params.gain.get());
    }

    pub fn is_prepared(&self) -> bool {
        self.spec.is_some()
    }

    pub fn spec(&self) -> Option<ProcessSpec> {
        self.spec
    }

    pub fn noise_gate(&self) -> &NoiseGate {
        &self.gate
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    pub fn drive(&self) -> &Drive {
        &self.drive
    }

    pub fn amp(&self) -> &AmpSimulator {
        &self.amp
    }

    pub fn cabinet(&self) -> &CabinetSimulator {
        &self.cabinet
    }

    pub fn chorus(&self) -> &Chorus {
        &self.chorus
    }

    pub fn delay(&self) -> &Delay {
        &self.delay
    }

    pub fn reverb(&self) -> &Reverb {
        &self.reverb
    }

    pub fn eq(&self) -> &Equalizer {
        &self.eq
    }

    /// Units after the gain/tone stage, in processing order
    fn post_tone_units(&mut self) -> [&mut dyn EffectUnit; 8] {
        [
            &mut self.compressor,
            &mut self.drive,
            &mut self.amp,
            &mut self.cabinet,
            &mut self.chorus,
            &mut self.delay,
            &mut self.reverb,
            &mut self.eq,
        ]
    }

    fn process_gain_and_tone(&mut self, spec: &ProcessSpec, buffer: &mut AudioBuffer) {
        let gain = self.params.gain.get();
        let tone = self.params.tone.get();

        if (gain - self.gain_ramp.target()).abs() > f32::EPSILON {
            let ramp_samples = if self.params.gain_glide() {
                self.gain_ramp_samples
            } else {
                buffer.num_samples() as u32
            };
            self.gain_ramp.set_target(gain, ramp_samples);
        }
        if self.tone_tracker.update([tone]) {
            let coeffs =
                BiquadCoefficients::low_pass(spec.sample_rate(), tone_cutoff_hz(tone), TONE_Q);
            for filter in &mut self.tone_filters {
                filter.set_coefficients(coeffs);
            }
        }

        let ramp = &mut self.gain_ramp;
        let [left, right] = &mut self.tone_filters;
        buffer.for_each_frame(|l, r| {
            let g = ramp.next_sample();
            *l = left.process(*l * g);
            *r = right.process(*r * g);
        });
    }
}

impl Default for DspChain {
    fn default() -> Self {
        Self::new()
    }
}
