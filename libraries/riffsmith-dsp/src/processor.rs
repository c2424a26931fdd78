//! Chain plus parameter smoothing
//!
//! [`ToneProcessor`] owns a [`DspChain`] and a [`SmoothedParameterSet`] with
//! six glided controls: `gain`, `tone`, `drive`, `reverb_mix`, `delay_mix`
//! and `chorus_mix`. Every block it advances the ramps, copies the smoothed
//! values into the chain atomics and then runs the chain, so a preset change
//! glides instead of jumping.
//!
//! The smoother owns those six values: writes that bypass the
//! [`ToneHandle`] are overwritten at the next block. The chain's own 50 ms
//! gain glide is switched off so the gain is only ramped once.

use crate::buffer::AudioBuffer;
use crate::chain::{BypassState, ChainHandle, DspChain};
use crate::error::Result;
use crate::mapping::PresetMapping;
use crate::smoothing::{ParamId, SmoothedParameterSet, SmootherHandle, DEFAULT_RAMP_SECONDS};
use riffsmith_core::{BlockKind, PresetData};
use tracing::debug;

pub const GAIN: &str = "gain";
pub const TONE: &str = "tone";
pub const DRIVE: &str = "drive";
pub const REVERB_MIX: &str = "reverb_mix";
pub const DELAY_MIX: &str = "delay_mix";
pub const CHORUS_MIX: &str = "chorus_mix";

#[derive(Debug, Clone, Copy)]
struct SmoothedIds {
    gain: ParamId,
    tone: ParamId,
    drive: ParamId,
    reverb_mix: ParamId,
    delay_mix: ParamId,
    chorus_mix: ParamId,
}

/// Audio-thread owner of the chain and its smoothed controls
pub struct ToneProcessor {
    chain: DspChain,
    smoother: SmoothedParameterSet,
    ids: SmoothedIds,
    controls: ChainHandle,
}

impl ToneProcessor {
    pub fn new() -> Result<Self> {
        let chain = DspChain::new();
        let controls = chain.handle();
        controls.set_gain_glide(false);

        let mut smoother = SmoothedParameterSet::new();
        let ids = SmoothedIds {
            gain: smoother.add_parameter(GAIN, controls.gain())?,
            tone: smoother.add_parameter(TONE, controls.tone())?,
            drive: smoother.add_parameter(DRIVE, controls.drive().drive.get())?,
            reverb_mix: smoother.add_parameter(REVERB_MIX, controls.reverb().mix.get())?,
            delay_mix: smoother.add_parameter(DELAY_MIX, controls.delay().mix.get())?,
            chorus_mix: smoother.add_parameter(CHORUS_MIX, controls.chorus().mix.get())?,
        };

        Ok(Self {
            chain,
            smoother,
            ids,
            controls,
        })
    }

    /// Control-side handle
    pub fn handle(&self) -> ToneHandle {
        ToneHandle {
            smoother: self.smoother.handle(),
            chain: self.chain.handle(),
        }
    }

    pub fn prepare_to_play(
        &mut self,
        sample_rate: f32,
        block_size: usize,
        num_channels: usize,
    ) -> Result<()> {
        self.chain
            .prepare_to_play(sample_rate, block_size, num_channels)?;
        self.smoother.prepare(sample_rate);
        self.copy_smoothed_values();
        Ok(())
    }

    /// Advance the ramps, publish them to the chain, process
    pub fn process_block(&mut self, buffer: &mut AudioBuffer) {
        self.smoother.advance(buffer.num_samples());
        self.copy_smoothed_values();
        self.chain.process_block(buffer);
    }

    pub fn release(&mut self) {
        self.chain.release();
    }

    pub fn chain(&self) -> &DspChain {
        &self.chain
    }

    pub fn smoother(&self) -> &SmoothedParameterSet {
        &self.smoother
    }

    fn copy_smoothed_values(&self) {
        let s = &self.smoother;
        let c = &self.controls;
        c.set_gain(s.value(self.ids.gain));
        c.set_tone(s.value(self.ids.tone));
        c.drive().drive.set(s.value(self.ids.drive));
        c.reverb().mix.set(s.value(self.ids.reverb_mix));
        c.delay().mix.set(s.value(self.ids.delay_mix));
        c.chorus().mix.set(s.value(self.ids.chorus_mix));
    }
}

/// Cloneable control-side handle of a [`ToneProcessor`]
#[derive(Debug, Clone)]
pub struct ToneHandle {
    smoother: SmootherHandle,
    chain: ChainHandle,
}

impl ToneHandle {
    /// Direct access to the chain atomics (non-smoothed parameters)
    pub fn chain(&self) -> &ChainHandle {
        &self.chain
    }

    pub fn smoother(&self) -> &SmootherHandle {
        &self.smoother
    }

    pub fn set_gain(&self, gain: f32) -> Result<()> {
        self.smoother.set_target(GAIN, gain, DEFAULT_RAMP_SECONDS)
    }

    pub fn set_tone(&self, tone: f32) -> Result<()> {
        self.smoother.set_target(TONE, tone, DEFAULT_RAMP_SECONDS)
    }

    pub fn set_drive(&self, drive: f32) -> Result<()> {
        self.smoother.set_target(DRIVE, drive, DEFAULT_RAMP_SECONDS)
    }

    pub fn set_bypass(&self, state: BypassState) {
        self.chain.set_bypass(state);
    }

    /// Apply a preset: blocks land on their units, then the mapped controls
    /// glide to their targets together
    pub fn apply_preset(&self, preset: &PresetData) -> Result<PresetMapping> {
        let mapping = PresetMapping::from_preset(preset);
        self.chain.apply_preset(preset);

        if let Some(drive) = mapping.drive {
            let unit = self.chain.drive();
            unit.set_drive_type(drive.drive_type);
            unit.set_enabled(true);
        }
        if let Some(reverb) = mapping.reverb {
            self.chain.reverb().decay_s.set(reverb.decay_s);
            self.chain.reverb().set_enabled(true);
        }
        if let Some(delay) = mapping.delay {
            self.chain.delay().time_ms.set(delay.time_ms);
            self.chain.delay().set_enabled(true);
        }
        if let Some(chorus) = mapping.chorus {
            self.chain.chorus().rate_hz.set(chorus.rate_hz);
            self.chain.chorus().set_enabled(true);
        }
        if let Some(eq) = mapping.eq {
            let unit = self.chain.eq();
            unit.low_gain_db.set(eq.low_db);
            unit.mid_gain_db.set(eq.mid_db);
            unit.high_gain_db.set(eq.high_db);
            unit.set_enabled(true);
        }

        self.smoother.set_all_targets([
            (GAIN, mapping.gain),
            (TONE, mapping.tone),
            (DRIVE, mapping.drive_amount()),
            (REVERB_MIX, mapping.reverb_mix()),
            (DELAY_MIX, mapping.delay_mix()),
            (CHORUS_MIX, mapping.chorus_mix()),
        ])?;

        debug!(
            preset = %preset.name,
            gain = mapping.gain,
            tone = mapping.tone,
            drive = mapping.drive_amount(),
            drive_enabled = self.chain.is_unit_enabled(BlockKind::Drive),
            "Preset mapped onto smoothed controls"
        );
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riffsmith_core::DriveType;

    #[test]
    fn registers_the_smoothed_controls() {
        let processor = ToneProcessor::new().unwrap();
        let handle = processor.smoother().handle();
        let names: Vec<&str> = handle.parameter_names().collect();
        for name in [GAIN, TONE, DRIVE, REVERB_MIX, DELAY_MIX, CHORUS_MIX] {
            assert!(names.contains(&name), "{name} missing");
        }
    }

    #[test]
    fn preset_glides_into_chain_atomics() {
        let mut processor = ToneProcessor::new().unwrap();
        processor.prepare_to_play(48_000.0, 480, 2).unwrap();
        let handle = processor.handle();

        handle
            .apply_preset(&PresetData::new("Blues Crunch Lead"))
            .unwrap();

        let mut buffer = AudioBuffer::new(2, 480);
        processor.process_block(&mut buffer);
        let first = handle.chain().gain();
        assert!(first > 1.0 && first < 1.2, "gain jumped to {first}");

        // 100 ms bulk ramp = 10 blocks of 10 ms
        for _ in 0..12 {
            processor.process_block(&mut buffer);
        }
        assert!((handle.chain().gain() - 1.2).abs() < 1e-3);
        assert!((handle.chain().drive().drive.get() - 0.4).abs() < 1e-3);
        assert_eq!(handle.chain().drive().drive_type(), DriveType::SoftClip);
        assert!(handle.chain().is_unit_enabled(BlockKind::Drive));
    }

    #[test]
    fn gain_reaches_target_when_the_glide_ends() {
        let mut processor = ToneProcessor::new().unwrap();
        processor.prepare_to_play(48_000.0, 480, 2).unwrap();
        let handle = processor.handle();
        handle.set_tone(1.0).unwrap();

        let mut buffer = AudioBuffer::new(2, 480);
        for _ in 0..10 {
            buffer.as_mut_slice().fill(0.25);
            processor.process_block(&mut buffer);
        }

        handle.set_gain(2.0).unwrap();
        let ramp_blocks = (DEFAULT_RAMP_SECONDS * 48_000.0 / 480.0).ceil() as usize;
        for _ in 0..=ramp_blocks {
            buffer.as_mut_slice().fill(0.25);
            processor.process_block(&mut buffer);
        }

        let last = buffer.channel(0)[479];
        assert!((last - 0.5).abs() < 1e-3, "output still gliding at {last}");
    }
}
