//! Effect block parameter sets
//!
//! One struct per block type. Every continuous field is backed by a
//! `ParamRange` in `crate::ranges`; discrete fields (models, waveforms) are
//! enums and are always valid once deserialized.

use crate::ranges;
use serde::{Deserialize, Serialize};

/// Declares a block parameter struct with its defaults, range clamping and
/// validation derived from the listed `ParamRange` constants.
macro_rules! block_params {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$fmeta:meta])* $field:ident = $range:path, )*
        }
        $( extra { $( $(#[$emeta:meta])* $extra:ident: $ety:ty = $edefault:expr, )* } )?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            /// Whether the block processes audio
            pub enabled: bool,
            $( $(#[$fmeta])* pub $field: f32, )*
            $( $( $(#[$emeta])* pub $extra: $ety, )* )?
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    enabled: true,
                    $( $field: $range.default, )*
                    $( $( $extra: $edefault, )* )?
                }
            }
        }

        impl $name {
            /// Clamp every continuous field into its valid range
            pub fn clamp_to_valid_ranges(&mut self) {
                $( self.$field = $range.clamp(self.$field); )*
            }

            /// Check that every continuous field lies inside its valid range
            pub fn is_valid(&self) -> bool {
                [$( $range.contains(self.$field) ),*].iter().all(|ok| *ok)
            }
        }
    };
}

/// Gate behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Close below threshold
    #[default]
    Normal,
    /// Attenuate while the signal is above threshold
    Ducking,
    /// Tempo-free rhythmic chopping while open
    Rhythmic,
}

/// Level the compressor's gain computer follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorMode {
    /// Instant attack peak hold
    #[default]
    Peak,
    /// Mean-square level over a 10 ms window
    Rms,
}

/// Clipping curve used by the drive block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveType {
    #[default]
    SoftClip,
    HardClip,
    Tube,
    Fuzz,
}

/// Amplifier voicing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmpModel {
    #[default]
    CleanBlackface,
    JanglyVox,
    BritCrunch,
    HiGain,
}

/// Built-in cabinet impulse responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CabinetIr {
    #[default]
    #[serde(rename = "1x12_open")]
    OneByTwelveOpen,
    #[serde(rename = "2x12_open")]
    TwoByTwelveOpen,
    #[serde(rename = "4x12_closed")]
    FourByTwelveClosed,
}

/// Chorus LFO shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChorusWaveform {
    #[default]
    Sine,
    Triangle,
    Saw,
    Square,
}

/// Reverb voicing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReverbAlgorithm {
    Room,
    Plate,
    #[default]
    Hall,
    Shimmer,
}

block_params! {
    /// Noise gate settings
    pub struct NoiseGateParams {
        threshold_db = ranges::noise_gate::THRESHOLD_DB,
        attack_ms = ranges::noise_gate::ATTACK_MS,
        hold_ms = ranges::noise_gate::HOLD_MS,
        release_ms = ranges::noise_gate::RELEASE_MS,
        lookahead_ms = ranges::noise_gate::LOOKAHEAD_MS,
        /// Distance between open and close thresholds
        hysteresis_db = ranges::noise_gate::HYSTERESIS_DB,
        rhythm_rate_hz = ranges::noise_gate::RHYTHM_RATE_HZ,
        rhythm_depth = ranges::noise_gate::RHYTHM_DEPTH,
    }
    extra {
        mode: GateMode = GateMode::Normal,
    }
}

block_params! {
    /// Compressor settings
    pub struct CompressorParams {
        ratio = ranges::compressor::RATIO,
        threshold_db = ranges::compressor::THRESHOLD_DB,
        attack_ms = ranges::compressor::ATTACK_MS,
        release_ms = ranges::compressor::RELEASE_MS,
        makeup_db = ranges::compressor::MAKEUP_DB,
        /// 0 = hard knee, 1 = 12 dB soft knee
        knee = ranges::compressor::KNEE,
        lookahead_ms = ranges::compressor::LOOKAHEAD_MS,
        /// Parallel compression blend
        mix = ranges::compressor::MIX,
    }
    extra {
        detector: DetectorMode = DetectorMode::Peak,
    }
}

block_params! {
    /// Drive / distortion settings
    pub struct DriveParams {
        drive = ranges::drive::DRIVE,
        tone = ranges::drive::TONE,
        level = ranges::drive::LEVEL,
    }
    extra {
        #[serde(rename = "type")]
        drive_type: DriveType = DriveType::SoftClip,
        /// Oversampling factor: 1, 2 or 4
        oversample: u32 = 2,
    }
}

block_params! {
    /// Amplifier settings
    pub struct AmpParams {
        gain = ranges::amp::GAIN,
        bass = ranges::amp::BASS,
        mid = ranges::amp::MID,
        treble = ranges::amp::TREBLE,
        presence = ranges::amp::PRESENCE,
        master = ranges::amp::MASTER,
    }
    extra {
        model: AmpModel = AmpModel::CleanBlackface,
    }
}

block_params! {
    /// Cabinet settings
    pub struct CabinetParams {
        low_cut_hz = ranges::cabinet::LOW_CUT_HZ,
        high_cut_hz = ranges::cabinet::HIGH_CUT_HZ,
        /// 0 = on-axis (bright), 1 = off-axis (dark)
        mic_position = ranges::cabinet::MIC_POSITION,
        room = ranges::cabinet::ROOM,
        ir_length_ms = ranges::cabinet::IR_LENGTH_MS,
    }
    extra {
        ir: CabinetIr = CabinetIr::OneByTwelveOpen,
    }
}

block_params! {
    /// Chorus settings
    pub struct ChorusParams {
        rate_hz = ranges::chorus::RATE_HZ,
        depth = ranges::chorus::DEPTH,
        mix = ranges::chorus::MIX,
        /// Negative values give a flanger-like comb
        feedback = ranges::chorus::FEEDBACK,
        base_delay_ms = ranges::chorus::BASE_DELAY_MS,
        spread = ranges::chorus::SPREAD,
    }
    extra {
        waveform: ChorusWaveform = ChorusWaveform::Sine,
    }
}

block_params! {
    /// Delay settings
    pub struct DelayParams {
        time_ms = ranges::delay::TIME_MS,
        feedback = ranges::delay::FEEDBACK,
        mix = ranges::delay::MIX,
        mod_rate_hz = ranges::delay::MOD_RATE_HZ,
        mod_depth = ranges::delay::MOD_DEPTH,
        high_cut_hz = ranges::delay::HIGH_CUT_HZ,
        low_cut_hz = ranges::delay::LOW_CUT_HZ,
        /// Ping-pong amount
        spread = ranges::delay::SPREAD,
        diffusion = ranges::delay::DIFFUSION,
    }
}

block_params! {
    /// Reverb settings
    pub struct ReverbParams {
        pre_delay_ms = ranges::reverb::PRE_DELAY_MS,
        decay_s = ranges::reverb::DECAY_S,
        damping = ranges::reverb::DAMPING,
        mix = ranges::reverb::MIX,
        mod_rate_hz = ranges::reverb::MOD_RATE_HZ,
        mod_depth = ranges::reverb::MOD_DEPTH,
        /// Semitones, Shimmer only
        shimmer_pitch = ranges::reverb::SHIMMER_PITCH,
        shimmer_mix = ranges::reverb::SHIMMER_MIX,
    }
    extra {
        algorithm: ReverbAlgorithm = ReverbAlgorithm::Hall,
    }
}

block_params! {
    /// Three-band equalizer settings
    pub struct EqParams {
        low_freq_hz = ranges::eq::LOW_FREQ_HZ,
        low_gain_db = ranges::eq::LOW_GAIN_DB,
        low_q = ranges::eq::SHELF_Q,
        mid_freq_hz = ranges::eq::MID_FREQ_HZ,
        mid_q = ranges::eq::MID_Q,
        mid_gain_db = ranges::eq::MID_GAIN_DB,
        high_freq_hz = ranges::eq::HIGH_FREQ_HZ,
        high_gain_db = ranges::eq::HIGH_GAIN_DB,
        high_q = ranges::eq::SHELF_Q,
        /// -1 = dark, +1 = bright
        tilt = ranges::eq::TILT,
    }
    extra {
        /// Gentle saturation after the filters
        analog: bool = false,
    }
}

impl DriveParams {
    /// Oversampling factor snapped to 1, 2 or 4
    pub fn oversample_factor(&self) -> u32 {
        match self.oversample {
            0 | 1 => 1,
            2 | 3 => 2,
            _ => 4,
        }
    }
}
