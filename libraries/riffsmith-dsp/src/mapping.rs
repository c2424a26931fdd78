//! Preset name and block mapping onto the smoothed chain controls
//!
//! Generated presets carry a descriptive name ("Heavy Metal Rhythm",
//! "Ambient Shimmer Pad"). Keywords in the name pick the glide targets for
//! the chain gain and tone, the drive, and the time-based effects; presets
//! with no recognised keyword fall back to what their enabled blocks imply.

use riffsmith_core::{ranges, BlockKind, DriveType, EffectBlock, PresetData};

const HEAVY: &[&str] = &["heavy", "metal", "distorted"];
const CLEAN: &[&str] = &["clean", "ambient"];
const ALIEN: &[&str] = &["alien", "ethereal", "weird"];
const BLUES: &[&str] = &["blues", "crunch"];

const SPACIOUS: &[&str] = &["ambient", "ethereal", "space"];
const STRANGE: &[&str] = &["alien", "weird"];
const ECHOING: &[&str] = &["space", "echo", "delay"];
const DREAMY: &[&str] = &["ambient", "ethereal"];

const BRIGHT: &[&str] = &["bright", "crisp", "shimmer"];
const WARM: &[&str] = &["warm", "dark", "mellow"];

/// Drive amount and curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveSetting {
    pub amount: f32,
    pub drive_type: DriveType,
}

/// Reverb mix plus decay in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbSetting {
    pub mix: f32,
    pub decay_s: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelaySetting {
    pub mix: f32,
    pub time_ms: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChorusSetting {
    pub mix: f32,
    pub rate_hz: f32,
}

/// Band gains in dB for a keyword EQ voicing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqVoicing {
    pub low_db: f32,
    pub mid_db: f32,
    pub high_db: f32,
}

impl EqVoicing {
    /// From 0..1 knob positions (0.5 = flat)
    fn from_knobs(low: f32, mid: f32, high: f32) -> Self {
        Self {
            low_db: ranges::eq::LOW_GAIN_DB.denormalize(low),
            mid_db: ranges::eq::MID_GAIN_DB.denormalize(mid),
            high_db: ranges::eq::HIGH_GAIN_DB.denormalize(high),
        }
    }
}

/// Targets derived from one preset
///
/// `None` means the preset leaves that unit off.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetMapping {
    pub gain: f32,
    pub tone: f32,
    pub drive: Option<DriveSetting>,
    pub reverb: Option<ReverbSetting>,
    pub delay: Option<DelaySetting>,
    pub chorus: Option<ChorusSetting>,
    pub eq: Option<EqVoicing>,
}

fn mentions(name: &str, words: &[&str]) -> bool {
    words.iter().any(|word| name.contains(word))
}

fn enabled_block(preset: &PresetData, kind: BlockKind) -> Option<&EffectBlock> {
    preset.block(kind).filter(|block| block.is_enabled())
}

impl PresetMapping {
    pub fn from_preset(preset: &PresetData) -> Self {
        let name = preset.name.to_lowercase();
        let (gain, tone) = Self::gain_and_tone(&name, preset);

        Self {
            gain,
            tone,
            drive: Self::drive(&name, preset),
            reverb: Self::reverb(&name, preset),
            delay: Self::delay(&name, preset),
            chorus: Self::chorus(&name, preset),
            eq: Self::eq(&name),
        }
    }

    fn gain_and_tone(name: &str, preset: &PresetData) -> (f32, f32) {
        if mentions(name, HEAVY) {
            (1.8, 0.3)
        } else if mentions(name, CLEAN) {
            (0.3, 0.7)
        } else if mentions(name, ALIEN) {
            (1.5, 0.8)
        } else if mentions(name, BLUES) {
            (1.2, 0.4)
        } else {
            let (mut gain, mut tone) = (
                ranges::chain::GAIN.default,
                ranges::chain::TONE.default,
            );
            if preset.has_enabled(BlockKind::Drive) {
                gain = 1.4;
                tone = 0.4;
            }
            if preset.has_enabled(BlockKind::Reverb) || preset.has_enabled(BlockKind::Delay) {
                tone = tone.max(0.6);
            }
            (gain, tone)
        }
    }

    fn drive(name: &str, preset: &PresetData) -> Option<DriveSetting> {
        let keyword = |amount, drive_type| Some(DriveSetting { amount, drive_type });
        if mentions(name, HEAVY) {
            keyword(0.8, DriveType::HardClip)
        } else if mentions(name, ALIEN) {
            keyword(0.6, DriveType::Fuzz)
        } else if mentions(name, BLUES) {
            keyword(0.4, DriveType::SoftClip)
        } else {
            match enabled_block(preset, BlockKind::Drive) {
                Some(EffectBlock::Drive(p)) => Some(DriveSetting {
                    amount: p.drive,
                    drive_type: p.drive_type,
                }),
                _ => None,
            }
        }
    }

    fn reverb(name: &str, preset: &PresetData) -> Option<ReverbSetting> {
        let decay = |position| ranges::reverb::DECAY_S.denormalize(position);
        if mentions(name, SPACIOUS) {
            Some(ReverbSetting {
                mix: 0.4,
                decay_s: decay(0.8),
            })
        } else if mentions(name, STRANGE) {
            Some(ReverbSetting {
                mix: 0.3,
                decay_s: decay(0.9),
            })
        } else {
            match enabled_block(preset, BlockKind::Reverb) {
                Some(EffectBlock::Reverb(p)) => Some(ReverbSetting {
                    mix: p.mix,
                    decay_s: p.decay_s,
                }),
                _ => None,
            }
        }
    }

    fn delay(name: &str, preset: &PresetData) -> Option<DelaySetting> {
        let keyword = |mix, time_ms| Some(DelaySetting { mix, time_ms });
        if mentions(name, ECHOING) {
            keyword(0.3, 500.0)
        } else if mentions(name, STRANGE) {
            keyword(0.2, 750.0)
        } else if mentions(name, DREAMY) {
            keyword(0.25, 600.0)
        } else {
            match enabled_block(preset, BlockKind::Delay) {
                Some(EffectBlock::Delay(p)) => Some(DelaySetting {
                    mix: p.mix,
                    time_ms: p.time_ms,
                }),
                _ => None,
            }
        }
    }

    fn chorus(name: &str, preset: &PresetData) -> Option<ChorusSetting> {
        if mentions(name, STRANGE) {
            Some(ChorusSetting {
                mix: 0.4,
                rate_hz: 1.5,
            })
        } else if mentions(name, DREAMY) {
            Some(ChorusSetting {
                mix: 0.3,
                rate_hz: 0.8,
            })
        } else {
            match enabled_block(preset, BlockKind::Chorus) {
                Some(EffectBlock::Chorus(p)) => Some(ChorusSetting {
                    mix: p.mix,
                    rate_hz: p.rate_hz,
                }),
                _ => None,
            }
        }
    }

    fn eq(name: &str) -> Option<EqVoicing> {
        if mentions(name, BRIGHT) {
            Some(EqVoicing::from_knobs(0.5, 0.6, 0.8))
        } else if mentions(name, WARM) {
            Some(EqVoicing::from_knobs(0.8, 0.5, 0.3))
        } else if mentions(name, STRANGE) {
            Some(EqVoicing::from_knobs(0.7, 0.3, 0.9))
        } else {
            None
        }
    }

    pub fn drive_amount(&self) -> f32 {
        self.drive.map_or(0.0, |d| d.amount)
    }

    pub fn reverb_mix(&self) -> f32 {
        self.reverb.map_or(0.0, |r| r.mix)
    }

    pub fn delay_mix(&self) -> f32 {
        self.delay.map_or(0.0, |d| d.mix)
    }

    pub fn chorus_mix(&self) -> f32 {
        self.chorus.map_or(0.0, |c| c.mix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riffsmith_core::{ChorusParams, DriveParams, ReverbParams};

    #[test]
    fn heavy_metal_keywords() {
        let mapping = PresetMapping::from_preset(&PresetData::new("Heavy Metal Rhythm"));
        assert_eq!((mapping.gain, mapping.tone), (1.8, 0.3));
        assert_eq!(
            mapping.drive,
            Some(DriveSetting {
                amount: 0.8,
                drive_type: DriveType::HardClip,
            })
        );
        assert!(mapping.reverb.is_none());
        assert!(mapping.delay.is_none());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let mapping = PresetMapping::from_preset(&PresetData::new("DISTORTED wall"));
        assert_eq!(mapping.gain, 1.8);
    }

    #[test]
    fn ambient_sets_time_effects() {
        let mapping = PresetMapping::from_preset(&PresetData::new("Ambient Wash"));
        assert_eq!((mapping.gain, mapping.tone), (0.3, 0.7));
        assert!(mapping.drive.is_none());

        let reverb = mapping.reverb.unwrap();
        assert_eq!(reverb.mix, 0.4);
        assert!((reverb.decay_s - ranges::reverb::DECAY_S.denormalize(0.8)).abs() < 1e-4);
        assert_eq!(mapping.delay_mix(), 0.25);
        assert_eq!(mapping.chorus_mix(), 0.3);
    }

    #[test]
    fn alien_gets_fuzz_and_long_reverb() {
        let mapping = PresetMapping::from_preset(&PresetData::new("Alien Signal"));
        assert_eq!((mapping.gain, mapping.tone), (1.5, 0.8));
        assert_eq!(mapping.drive.map(|d| d.drive_type), Some(DriveType::Fuzz));
        assert_eq!(mapping.reverb_mix(), 0.3);
        assert_eq!(mapping.chorus.map(|c| c.rate_hz), Some(1.5));
        assert!(mapping.eq.is_some());
    }

    #[test]
    fn unnamed_preset_follows_its_blocks() {
        let preset = PresetData::new("Sunday Session")
            .with_block(EffectBlock::Drive(DriveParams {
                drive: 0.35,
                drive_type: DriveType::Tube,
                ..DriveParams::default()
            }))
            .with_block(EffectBlock::Reverb(ReverbParams {
                mix: 0.15,
                ..ReverbParams::default()
            }))
            .with_block(EffectBlock::Chorus(ChorusParams {
                enabled: false,
                ..ChorusParams::default()
            }));
        let mapping = PresetMapping::from_preset(&preset);

        assert_eq!(mapping.gain, 1.4);
        assert_eq!(mapping.tone, 0.6);
        assert_eq!(
            mapping.drive,
            Some(DriveSetting {
                amount: 0.35,
                drive_type: DriveType::Tube,
            })
        );
        assert_eq!(mapping.reverb_mix(), 0.15);
        assert!(mapping.chorus.is_none());
    }

    #[test]
    fn plain_preset_keeps_neutral_controls() {
        let mapping = PresetMapping::from_preset(&PresetData::new("Untitled"));
        assert_eq!(mapping.gain, ranges::chain::GAIN.default);
        assert_eq!(mapping.tone, ranges::chain::TONE.default);
        assert_eq!(mapping.drive_amount(), 0.0);
    }

    #[test]
    fn warm_voicing_boosts_lows() {
        let mapping = PresetMapping::from_preset(&PresetData::new("Warm Jazz"));
        let eq = mapping.eq.unwrap();
        assert!(eq.low_db > 0.0);
        assert!(eq.high_db < 0.0);
        assert!(eq.mid_db.abs() < 1e-4);
    }
}
