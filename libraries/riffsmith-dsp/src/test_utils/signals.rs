//! Test signal generation
//!
//! All generators return channel-major [`AudioBuffer`]s with the same
//! content on every channel.

use crate::buffer::AudioBuffer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

fn fill(num_channels: usize, num_samples: usize, f: impl Fn(usize) -> f32) -> AudioBuffer {
    let mut buffer = AudioBuffer::new(num_channels, num_samples);
    for channel in buffer.channels_mut() {
        for (i, sample) in channel.iter_mut().enumerate() {
            *sample = f(i);
        }
    }
    buffer
}

/// Sine wave
///
/// # Arguments
/// * `frequency` - Frequency in Hz
/// * `sample_rate` - Sample rate in Hz
/// * `num_samples` - Samples per channel
/// * `amplitude` - Peak amplitude
pub fn sine(
    frequency: f32,
    sample_rate: f32,
    num_channels: usize,
    num_samples: usize,
    amplitude: f32,
) -> AudioBuffer {
    fill(num_channels, num_samples, |i| {
        amplitude * (2.0 * PI * frequency * i as f32 / sample_rate).sin()
    })
}

/// Sine whose level alternates between two values every `segment_ms`
///
/// Starts at `low_db`. Used to exercise gate hysteresis.
pub fn alternating_level_sine(
    frequency: f32,
    sample_rate: f32,
    num_samples: usize,
    low_db: f32,
    high_db: f32,
    segment_ms: f32,
) -> AudioBuffer {
    let segment = ((segment_ms * 0.001 * sample_rate) as usize).max(1);
    let low = crate::primitives::db_to_gain(low_db);
    let high = crate::primitives::db_to_gain(high_db);
    fill(2, num_samples, |i| {
        let amplitude = if (i / segment) % 2 == 0 { low } else { high };
        amplitude * (2.0 * PI * frequency * i as f32 / sample_rate).sin()
    })
}

/// Seeded white noise in `[-amplitude, amplitude]`
pub fn white_noise(num_channels: usize, num_samples: usize, amplitude: f32, seed: u64) -> AudioBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise: Vec<f32> = (0..num_samples)
        .map(|_| rng.gen_range(-1.0f32..=1.0) * amplitude)
        .collect();
    fill(num_channels, num_samples, |i| noise[i])
}

/// Single unit impulse at sample 0
pub fn impulse(num_channels: usize, num_samples: usize, amplitude: f32) -> AudioBuffer {
    fill(num_channels, num_samples, |i| if i == 0 { amplitude } else { 0.0 })
}
