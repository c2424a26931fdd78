//! Drive / distortion pedal
//!
//! Input gain, oversampled waveshaping, post tone low-pass and output level.
//! The tone control sweeps the low-pass from 1 kHz (dark) to 10 kHz (bright).

use super::unit::{EffectUnit, Lifecycle, UnitState};
use crate::buffer::{AudioBuffer, ProcessSpec};
use crate::params::{AtomicChoice, ChangeTracker, Parameter};
use crate::primitives::{sanitize, saturation, Biquad, BiquadCoefficients, Oversampler};
use riffsmith_core::{ranges, BlockKind, DriveParams, DriveType};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Shared, lock-free drive parameters
#[derive(Debug)]
pub struct DriveParameters {
    enabled: AtomicBool,
    pub drive: Parameter,
    pub tone: Parameter,
    pub level: Parameter,
    drive_type: AtomicChoice<DriveType>,
    oversample: AtomicU32,
}

impl DriveParameters {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            drive: Parameter::new("drive", ranges::drive::DRIVE),
            tone: Parameter::new("tone", ranges::drive::TONE),
            level: Parameter::new("level", ranges::drive::LEVEL),
            drive_type: AtomicChoice::new(DriveType::SoftClip),
            oversample: AtomicU32::new(2),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_drive_type(&self, drive_type: DriveType) {
        self.drive_type.store(drive_type);
    }

    pub fn drive_type(&self) -> DriveType {
        self.drive_type.load()
    }

    /// Oversampling factor; snapped to 1, 2 or 4 when applied
    pub fn set_oversample(&self, factor: u32) {
        self.oversample.store(factor.clamp(1, 4), Ordering::Relaxed);
    }

    /// Copy every field of a preset block
    pub fn apply(&self, params: &DriveParams) {
        self.drive.set(params.drive);
        self.tone.set(params.tone);
        self.level.set(params.level);
        self.set_drive_type(params.drive_type);
        self.set_oversample(params.oversample_factor());
        self.set_enabled(params.enabled);
    }

    /// Read every field once
    pub fn snapshot(&self) -> DriveParams {
        DriveParams {
            enabled: self.is_enabled(),
            drive: self.drive.get(),
            tone: self.tone.get(),
            level: self.level.get(),
            drive_type: self.drive_type(),
            oversample: self.oversample.load(Ordering::Relaxed),
        }
    }
}

impl Default for DriveParameters {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive pedal
pub struct Drive {
    params: Arc<DriveParameters>,
    lifecycle: Lifecycle,
    tracker: ChangeTracker<5>,

    oversamplers: [Oversampler; 2],
    tone_filters: [Biquad; 2],

    // Coefficient cache
    pre_gain: f32,
    drive_type: DriveType,
    level: f32,
    oversample: u32,
}

impl Drive {
    pub fn new() -> Self {
        Self::with_parameters(Arc::new(DriveParameters::new()))
    }

    pub fn with_parameters(params: Arc<DriveParameters>) -> Self {
        Self {
            params,
            lifecycle: Lifecycle::new(),
            tracker: ChangeTracker::new(),
            oversamplers: Default::default(),
            tone_filters: Default::default(),
            pre_gain: 1.0,
            drive_type: DriveType::SoftClip,
            level: 1.0,
            oversample: 0,
        }
    }

    pub fn parameters(&self) -> Arc<DriveParameters> {
        Arc::clone(&self.params)
    }

    pub fn apply_parameters(&self, params: &DriveParams) {
        self.params.apply(params);
    }

    /// Recompute coefficients if the parameters moved
    fn update_coefficients(&mut self, p: &DriveParams) {
        let factor = p.oversample_factor();
        if !self.tracker.update([
            p.drive,
            p.tone,
            p.level,
            f32::from(self.params.drive_type.load_index()),
            factor as f32,
        ]) {
            return;
        }

        let sample_rate = self.lifecycle.sample_rate();

        // Input gain (up to 4x) stacked with the shaping gain (up to 21x)
        self.pre_gain = (1.0 + p.drive * 3.0) * (1.0 + p.drive * 20.0);
        self.drive_type = p.drive_type;
        self.level = p.level;

        let cutoff = 1000.0 + p.tone * 9000.0;
        let coeffs = BiquadCoefficients::low_pass(sample_rate, cutoff, 0.707);
        for filter in &mut self.tone_filters {
            filter.set_coefficients(coeffs);
        }

        if factor != self.oversample {
            self.oversample = factor;
            for os in &mut self.oversamplers {
                os.prepare(sample_rate, factor);
            }
        }
    }
}

impl Default for Drive {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectUnit for Drive {
    fn prepare(&mut self, spec: &ProcessSpec) {
        self.lifecycle.prepare(self.name(), spec);
        self.oversample = 0;
        self.tracker.invalidate();
        self.reset();
    }

    fn process_block(&mut self, buffer: &mut AudioBuffer) {
        if !self.lifecycle.is_prepared() || !self.params.is_enabled() {
            return;
        }

        let p = self.params.snapshot();
        self.update_coefficients(&p);

        let pre_gain = self.pre_gain;
        let level = self.level;
        let drive_type = self.drive_type;

        for ((channel, os), tone) in buffer
            .channels_mut()
            .zip(self.oversamplers.iter_mut())
            .zip(self.tone_filters.iter_mut())
        {
            for sample in channel.iter_mut() {
                let shaped = os.process(*sample * pre_gain, |x| saturation::shape(drive_type, x));
                *sample = sanitize(tone.process(shaped) * level);
            }
        }
    }

    fn release(&mut self) {
        self.lifecycle.release(self.name());
    }

    fn reset(&mut self) {
        for os in &mut self.oversamplers {
            os.reset();
        }
        for filter in &mut self.tone_filters {
            filter.reset();
        }
    }

    fn is_enabled(&self) -> bool {
        self.params.is_enabled()
    }

    fn state(&self) -> UnitState {
        self.lifecycle.state()
    }

    fn kind(&self) -> BlockKind {
        BlockKind::Drive
    }

    fn name(&self) -> &'static str {
        "Drive"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::tests::sine_buffer;

    fn prepared_drive() -> Drive {
        let mut drive = Drive::new();
        drive.prepare(&ProcessSpec::new(48_000.0, 512, 2).unwrap());
        drive
    }

    #[test]
    fn unprepared_drive_is_pass_through() {
        let mut drive = Drive::new();
        let mut buffer = sine_buffer(440.0, 48_000.0, 512, 0.5);
        let original = buffer.clone();
        drive.process_block(&mut buffer);
        assert_eq!(buffer, original);
        assert_eq!(drive.state(), UnitState::Uninitialized);
    }

    #[test]
    fn hard_clip_bounds_output() {
        let mut drive = prepared_drive();
        drive.apply_parameters(&DriveParams {
            drive: 1.0,
            tone: 1.0,
            level: 1.0,
            drive_type: DriveType::HardClip,
            oversample: 1,
            ..DriveParams::default()
        });

        let mut buffer = sine_buffer(220.0, 48_000.0, 4096, 0.8);
        drive.process_block(&mut buffer);

        // Tone filter ringing may overshoot the clip level slightly
        assert!(buffer.peak() < 1.2, "peak {}", buffer.peak());
        assert!(buffer.peak() > 0.8);
    }

    #[test]
    fn more_drive_is_louder_for_quiet_input() {
        let rms = |drive_amount: f32| {
            let mut drive = prepared_drive();
            drive.apply_parameters(&DriveParams {
                drive: drive_amount,
                drive_type: DriveType::SoftClip,
                ..DriveParams::default()
            });
            let mut buffer = sine_buffer(220.0, 48_000.0, 4096, 0.05);
            drive.process_block(&mut buffer);
            let ch = buffer.channel(0);
            (ch.iter().map(|s| s * s).sum::<f32>() / ch.len() as f32).sqrt()
        };
        assert!(rms(0.9) > rms(0.1) * 2.0);
    }

    #[test]
    fn every_type_produces_finite_output() {
        for drive_type in [
            DriveType::SoftClip,
            DriveType::HardClip,
            DriveType::Tube,
            DriveType::Fuzz,
        ] {
            for oversample in [1, 2, 4] {
                let mut drive = prepared_drive();
                drive.apply_parameters(&DriveParams {
                    drive_type,
                    oversample,
                    ..DriveParams::default()
                });
                let mut buffer = sine_buffer(1000.0, 48_000.0, 1024, 1.0);
                drive.process_block(&mut buffer);
                assert!(buffer.as_slice().iter().all(|s| s.is_finite()));
            }
        }
    }

    #[test]
    fn released_drive_is_pass_through() {
        let mut drive = prepared_drive();
        drive.release();
        let mut buffer = sine_buffer(440.0, 48_000.0, 256, 0.5);
        let original = buffer.clone();
        drive.process_block(&mut buffer);
        assert_eq!(buffer, original);
        assert_eq!(drive.state(), UnitState::Released);
    }

    #[test]
    fn snapshot_reflects_applied_block() {
        let params = DriveParameters::new();
        params.apply(&DriveParams {
            drive: 0.8,
            drive_type: DriveType::Fuzz,
            oversample: 4,
            enabled: false,
            ..DriveParams::default()
        });
        let snap = params.snapshot();
        assert_eq!(snap.drive, 0.8);
        assert_eq!(snap.drive_type, DriveType::Fuzz);
        assert_eq!(snap.oversample, 4);
        assert!(!snap.enabled);
    }
}
