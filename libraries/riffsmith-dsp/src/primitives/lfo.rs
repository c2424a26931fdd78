//! Low-frequency oscillator for modulation effects

use riffsmith_core::ChorusWaveform;
use std::f32::consts::TAU;

/// Phase-accumulator LFO producing values in `[-1, 1]`
#[derive(Debug, Clone, Default)]
pub struct Lfo {
    phase: f32,
    increment: f32,
}

impl Lfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&mut self, rate_hz: f32, sample_rate: f32) {
        self.increment = if sample_rate > 0.0 {
            (rate_hz / sample_rate).max(0.0)
        } else {
            0.0
        };
    }

    /// Current phase in cycles, `[0, 1)`
    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Value at the current phase shifted by `offset` cycles
    #[inline]
    pub fn value(&self, waveform: ChorusWaveform, offset: f32) -> f32 {
        let phase = (self.phase + offset).rem_euclid(1.0);
        match waveform {
            ChorusWaveform::Sine => (TAU * phase).sin(),
            ChorusWaveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            ChorusWaveform::Saw => 2.0 * phase - 1.0,
            ChorusWaveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }

    /// Move the phase forward one sample
    #[inline]
    pub fn advance(&mut self) {
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
    }
}
