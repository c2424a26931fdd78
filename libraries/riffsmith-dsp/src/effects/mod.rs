//! Guitar effect units
//!
//! Every unit implements [`EffectUnit`] and reads its parameters from an
//! `Arc` of atomics shared with control threads.
//!
//! Available units:
//! - **NoiseGate**: hysteresis gate with Normal, Ducking and Rhythmic modes
//! - **Compressor**: soft-knee feed-forward compressor with lookahead
//! - **Drive**: oversampled soft/hard/tube/fuzz clipping
//! - **AmpSimulator**: preamp saturation and tone stack per amp model
//! - **CabinetSimulator**: partitioned convolution with synthetic speaker IRs
//! - **Chorus**: LFO-modulated delay, negative feedback for flanging
//! - **Delay**: filtered feedback echo with ping-pong spread and diffusion
//! - **Reverb**: Freeverb-style tanks with plate/hall/room voicings and shimmer
//! - **Equalizer**: low shelf, mid peak, high shelf and tilt

mod amp;
mod cabinet;
mod chorus;
mod compressor;
mod delay;
mod drive;
mod equalizer;
mod noise_gate;
mod reverb;
mod unit;

pub use amp::{AmpParameters, AmpSimulator, Voicing};
pub use cabinet::{synthesize_ir, CabinetParameters, CabinetProfile, CabinetSimulator};
pub use chorus::{Chorus, ChorusParameters};
pub use compressor::{output_level_db, Compressor, CompressorMeter, CompressorParameters};
pub use delay::{Delay, DelayParameters};
pub use drive::{Drive, DriveParameters};
pub use equalizer::{response_db, EqParameters, Equalizer};
pub use noise_gate::{GateMeter, NoiseGate, NoiseGateParameters};
pub use reverb::{Reverb, ReverbParameters, TankSettings};
pub use unit::{EffectUnit, Lifecycle, UnitState};

#[cfg(test)]
pub(crate) mod tests {
    use crate::buffer::AudioBuffer;

    /// Stereo buffer with the same sine on both channels
    pub(crate) fn sine_buffer(
        freq: f32,
        sample_rate: f32,
        num_samples: usize,
        amplitude: f32,
    ) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(2, num_samples);
        for channel in buffer.channels_mut() {
            for (i, sample) in channel.iter_mut().enumerate() {
                let t = i as f32 / sample_rate;
                *sample = amplitude * (2.0 * std::f32::consts::PI * freq * t).sin();
            }
        }
        buffer
    }
}
