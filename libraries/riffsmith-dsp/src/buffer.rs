//! Audio buffers and processing configuration
//!
//! `AudioBuffer` stores channels contiguously (channel-major): all samples of
//! channel 0, then all samples of channel 1. Effects process in place.
//! Interleaved conversion is provided for host glue that speaks `L, R, L, R`.

use crate::error::{DspError, Result};

/// Channel limit of the engine (mono or stereo guitar signal)
pub const MAX_CHANNELS: usize = 2;

/// Lowest accepted sample rate
pub const MIN_SAMPLE_RATE: f32 = 8_000.0;

/// Highest accepted sample rate
pub const MAX_SAMPLE_RATE: f32 = 384_000.0;

/// Processing configuration handed to every unit at prepare time
///
/// Only obtainable through [`ProcessSpec::new`], so a unit can never be
/// prepared with a zero or non-finite sample rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    sample_rate: f32,
    max_block_size: usize,
    num_channels: usize,
}

impl ProcessSpec {
    /// Validate and build a processing configuration
    pub fn new(sample_rate: f32, max_block_size: usize, num_channels: usize) -> Result<Self> {
        if !sample_rate.is_finite() || !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate)
        {
            return Err(DspError::InvalidProcessSpec(format!(
                "sample rate {} Hz outside {}..={} Hz",
                sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            )));
        }
        if max_block_size == 0 {
            return Err(DspError::InvalidProcessSpec(
                "block size must be at least one sample".to_string(),
            ));
        }
        if num_channels == 0 || num_channels > MAX_CHANNELS {
            return Err(DspError::InvalidProcessSpec(format!(
                "{} channels requested, 1..={} supported",
                num_channels, MAX_CHANNELS
            )));
        }

        Ok(Self {
            sample_rate,
            max_block_size,
            num_channels,
        })
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Largest block the host will deliver
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Convert a duration in milliseconds to whole samples
    #[inline]
    pub fn ms_to_samples(&self, ms: f32) -> usize {
        (ms.max(0.0) * 0.001 * self.sample_rate).round() as usize
    }
}

/// Rectangular, channel-major block of f32 samples
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    data: Vec<f32>,
    num_channels: usize,
    num_samples: usize,
}

impl AudioBuffer {
    /// Create a silent buffer
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            data: vec![0.0; num_channels * num_samples],
            num_channels,
            num_samples,
        }
    }

    /// Build from per-channel slices; all channels must have the same length
    pub fn from_channels(channels: &[&[f32]]) -> Option<Self> {
        let num_samples = channels.first().map_or(0, |c| c.len());
        if channels.iter().any(|c| c.len() != num_samples) {
            return None;
        }
        let data = channels.iter().flat_map(|c| c.iter().copied()).collect();
        Some(Self {
            data,
            num_channels: channels.len(),
            num_samples,
        })
    }

    /// Build from interleaved frames (`L, R, L, R, ...`)
    pub fn from_interleaved(interleaved: &[f32], num_channels: usize) -> Self {
        if num_channels == 0 {
            return Self::new(0, 0);
        }
        let num_samples = interleaved.len() / num_channels;
        let mut buffer = Self::new(num_channels, num_samples);
        for (frame_idx, frame) in interleaved.chunks_exact(num_channels).enumerate() {
            for (ch, &sample) in frame.iter().enumerate() {
                buffer.data[ch * num_samples + frame_idx] = sample;
            }
        }
        buffer
    }

    /// Write the buffer out as interleaved frames
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.data.len()];
        self.copy_to_interleaved(&mut out);
        out
    }

    /// Write into an existing interleaved slice (copies as many frames as fit)
    pub fn copy_to_interleaved(&self, out: &mut [f32]) {
        if self.num_channels == 0 {
            return;
        }
        for (frame_idx, frame) in out
            .chunks_exact_mut(self.num_channels)
            .take(self.num_samples)
            .enumerate()
        {
            for (ch, slot) in frame.iter_mut().enumerate() {
                *slot = self.data[ch * self.num_samples + frame_idx];
            }
        }
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Samples per channel
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// One channel's samples
    pub fn channel(&self, channel: usize) -> &[f32] {
        let start = channel * self.num_samples;
        &self.data[start..start + self.num_samples]
    }

    /// One channel's samples, mutable
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        let start = channel * self.num_samples;
        &mut self.data[start..start + self.num_samples]
    }

    /// Iterate over channels mutably
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        self.data.chunks_exact_mut(self.num_samples.max(1))
    }

    /// All samples, channel-major
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// All samples, channel-major, mutable
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Zero every sample
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Multiply every sample by a constant
    pub fn apply_gain(&mut self, gain: f32) {
        for sample in &mut self.data {
            *sample *= gain;
        }
    }

    /// Visit every frame as a `(left, right)` pair
    ///
    /// Mono buffers present their single channel as `left`; the `right`
    /// reference is a scratch copy whose result is discarded.
    #[inline]
    pub fn for_each_frame(&mut self, mut f: impl FnMut(&mut f32, &mut f32)) {
        match self.num_channels {
            0 => {}
            1 => {
                for sample in &mut self.data {
                    let mut scratch = *sample;
                    f(sample, &mut scratch);
                }
            }
            _ => {
                let (left, rest) = self.data.split_at_mut(self.num_samples);
                for (l, r) in left.iter_mut().zip(rest.iter_mut()) {
                    f(l, r);
                }
            }
        }
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_rejects_invalid_sample_rates() {
        assert!(ProcessSpec::new(0.0, 512, 2).is_err());
        assert!(ProcessSpec::new(-44100.0, 512, 2).is_err());
        assert!(ProcessSpec::new(f32::NAN, 512, 2).is_err());
        assert!(ProcessSpec::new(1_000_000.0, 512, 2).is_err());
        assert!(ProcessSpec::new(44100.0, 512, 2).is_ok());
    }

    #[test]
    fn spec_rejects_zero_block_and_channels() {
        assert!(ProcessSpec::new(48000.0, 0, 2).is_err());
        assert!(ProcessSpec::new(48000.0, 256, 0).is_err());
        assert!(ProcessSpec::new(48000.0, 256, 3).is_err());
    }

    #[test]
    fn ms_to_samples_rounds() {
        let spec = ProcessSpec::new(48000.0, 256, 2).unwrap();
        assert_eq!(spec.ms_to_samples(10.0), 480);
        assert_eq!(spec.ms_to_samples(-5.0), 0);
    }

    #[test]
    fn interleaved_roundtrip_keeps_channel_order() {
        let interleaved = [1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let buffer = AudioBuffer::from_interleaved(&interleaved, 2);

        assert_eq!(buffer.num_samples(), 3);
        assert_eq!(buffer.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(buffer.channel(1), &[-1.0, -2.0, -3.0]);
        assert_eq!(buffer.to_interleaved(), interleaved.to_vec());
    }

    #[test]
    fn from_channels_rejects_ragged_input() {
        let left = [0.0; 4];
        let right = [0.0; 3];
        assert!(AudioBuffer::from_channels(&[&left, &right]).is_none());
    }

    #[test]
    fn for_each_frame_pairs_channels() {
        let mut buffer = AudioBuffer::from_channels(&[&[1.0, 2.0], &[10.0, 20.0]]).unwrap();
        buffer.for_each_frame(|l, r| {
            let sum = *l + *r;
            *l = sum;
            *r = -sum;
        });
        assert_eq!(buffer.channel(0), &[11.0, 22.0]);
        assert_eq!(buffer.channel(1), &[-11.0, -22.0]);
    }

    #[test]
    fn for_each_frame_mono_only_writes_left() {
        let mut buffer = AudioBuffer::from_channels(&[&[0.5, 0.25]]).unwrap();
        buffer.for_each_frame(|l, r| {
            *r = 100.0;
            *l *= 2.0;
        });
        assert_eq!(buffer.channel(0), &[1.0, 0.5]);
    }
}
