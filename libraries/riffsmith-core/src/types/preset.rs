//! Preset and effect block model

use super::blocks::{
    AmpParams, CabinetParams, ChorusParams, CompressorParams, DelayParams, DriveParams, EqParams,
    NoiseGateParams, ReverbParams,
};
use crate::error::{PresetError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a block type without its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    NoiseGate,
    Compressor,
    Drive,
    Amp,
    Cab,
    Chorus,
    Delay,
    Reverb,
    Eq,
}

impl BlockKind {
    /// All block kinds in signal-chain order
    pub const ALL: [BlockKind; 9] = [
        BlockKind::NoiseGate,
        BlockKind::Compressor,
        BlockKind::Drive,
        BlockKind::Amp,
        BlockKind::Cab,
        BlockKind::Chorus,
        BlockKind::Delay,
        BlockKind::Reverb,
        BlockKind::Eq,
    ];

    /// Wire name of the block
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoiseGate => "noise_gate",
            Self::Compressor => "compressor",
            Self::Drive => "drive",
            Self::Amp => "amp",
            Self::Cab => "cab",
            Self::Chorus => "chorus",
            Self::Delay => "delay",
            Self::Reverb => "reverb",
            Self::Eq => "eq",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block of a preset chain
///
/// Serialized with an inline tag: `{"block": "drive", "enabled": true, "drive": 0.6, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block", rename_all = "snake_case")]
pub enum EffectBlock {
    NoiseGate(NoiseGateParams),
    Compressor(CompressorParams),
    Drive(DriveParams),
    Amp(AmpParams),
    Cab(CabinetParams),
    Chorus(ChorusParams),
    Delay(DelayParams),
    Reverb(ReverbParams),
    Eq(EqParams),
}

impl EffectBlock {
    /// Block type
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::NoiseGate(_) => BlockKind::NoiseGate,
            Self::Compressor(_) => BlockKind::Compressor,
            Self::Drive(_) => BlockKind::Drive,
            Self::Amp(_) => BlockKind::Amp,
            Self::Cab(_) => BlockKind::Cab,
            Self::Chorus(_) => BlockKind::Chorus,
            Self::Delay(_) => BlockKind::Delay,
            Self::Reverb(_) => BlockKind::Reverb,
            Self::Eq(_) => BlockKind::Eq,
        }
    }

    /// Whether the block processes audio
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::NoiseGate(p) => p.enabled,
            Self::Compressor(p) => p.enabled,
            Self::Drive(p) => p.enabled,
            Self::Amp(p) => p.enabled,
            Self::Cab(p) => p.enabled,
            Self::Chorus(p) => p.enabled,
            Self::Delay(p) => p.enabled,
            Self::Reverb(p) => p.enabled,
            Self::Eq(p) => p.enabled,
        }
    }

    /// Clamp the block's parameters into their valid ranges
    pub fn clamp_to_valid_ranges(&mut self) {
        match self {
            Self::NoiseGate(p) => p.clamp_to_valid_ranges(),
            Self::Compressor(p) => p.clamp_to_valid_ranges(),
            Self::Drive(p) => p.clamp_to_valid_ranges(),
            Self::Amp(p) => p.clamp_to_valid_ranges(),
            Self::Cab(p) => p.clamp_to_valid_ranges(),
            Self::Chorus(p) => p.clamp_to_valid_ranges(),
            Self::Delay(p) => p.clamp_to_valid_ranges(),
            Self::Reverb(p) => p.clamp_to_valid_ranges(),
            Self::Eq(p) => p.clamp_to_valid_ranges(),
        }
    }

    /// Check the block's parameters against their valid ranges
    pub fn is_valid(&self) -> bool {
        match self {
            Self::NoiseGate(p) => p.is_valid(),
            Self::Compressor(p) => p.is_valid(),
            Self::Drive(p) => p.is_valid(),
            Self::Amp(p) => p.is_valid(),
            Self::Cab(p) => p.is_valid(),
            Self::Chorus(p) => p.is_valid(),
            Self::Delay(p) => p.is_valid(),
            Self::Reverb(p) => p.is_valid(),
            Self::Eq(p) => p.is_valid(),
        }
    }
}

/// A complete tone preset
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PresetData {
    /// Display name; also drives keyword-based tone mapping
    pub name: String,
    /// Free-form notes from the generator
    #[serde(default)]
    pub notes: String,
    /// Blocks in the order the generator listed them
    #[serde(default)]
    pub chain: Vec<EffectBlock>,
}

impl PresetData {
    /// Create an empty preset with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notes: String::new(),
            chain: Vec::new(),
        }
    }

    /// Builder: append a block
    pub fn with_block(mut self, block: EffectBlock) -> Self {
        self.chain.push(block);
        self
    }

    /// Builder: set notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// First block of the given kind
    pub fn block(&self, kind: BlockKind) -> Option<&EffectBlock> {
        self.chain.iter().find(|b| b.kind() == kind)
    }

    /// Whether an enabled block of the given kind is present
    pub fn has_enabled(&self, kind: BlockKind) -> bool {
        self.block(kind).is_some_and(EffectBlock::is_enabled)
    }

    /// Clamp every block's parameters into their valid ranges
    pub fn clamp_to_valid_ranges(&mut self) {
        for block in &mut self.chain {
            block.clamp_to_valid_ranges();
        }
    }

    /// A preset is usable when it has a name and at least one block
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.chain.is_empty()
    }

    /// Check validity, including every block's parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PresetError::invalid("preset has no name"));
        }
        if self.chain.is_empty() {
            return Err(PresetError::invalid("preset has no blocks"));
        }
        if let Some(block) = self.chain.iter().find(|b| !b.is_valid()) {
            return Err(PresetError::invalid(format!(
                "block '{}' has out-of-range parameters",
                block.kind()
            )));
        }
        Ok(())
    }

    /// Parse a preset from JSON and clamp it into valid ranges
    pub fn from_json(json: &str) -> Result<Self> {
        let mut preset: Self = serde_json::from_str(json)?;
        preset.clamp_to_valid_ranges();
        Ok(preset)
    }

    /// Serialize the preset to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DriveType, ReverbAlgorithm};

    #[test]
    fn empty_preset_is_invalid() {
        assert!(!PresetData::new("Nameless").is_valid());
        assert!(!PresetData::new("  ")
            .with_block(EffectBlock::Drive(DriveParams::default()))
            .is_valid());
    }

    #[test]
    fn named_preset_with_block_is_valid() {
        let preset =
            PresetData::new("Crunch").with_block(EffectBlock::Drive(DriveParams::default()));
        assert!(preset.is_valid());
        assert!(preset.validate().is_ok());
    }

    #[test]
    fn validate_reports_out_of_range_block() {
        let preset = PresetData::new("Broken").with_block(EffectBlock::Delay(DelayParams {
            feedback: 3.0,
            ..DelayParams::default()
        }));
        let err = preset.validate().unwrap_err();
        assert!(err.to_string().contains("delay"));
    }

    #[test]
    fn parses_tagged_blocks() {
        let json = r#"{
            "name": "Heavy Metal",
            "notes": "tight low end",
            "chain": [
                {"block": "noise_gate", "threshold_db": -60.0},
                {"block": "drive", "enabled": true, "drive": 0.8, "type": "hardclip"},
                {"block": "reverb", "algorithm": "plate", "mix": 7.0}
            ]
        }"#;

        let preset = PresetData::from_json(json).unwrap();

        assert_eq!(preset.chain.len(), 3);
        assert_eq!(preset.chain[0].kind(), BlockKind::NoiseGate);
        match &preset.chain[1] {
            EffectBlock::Drive(d) => {
                assert_eq!(d.drive_type, DriveType::HardClip);
                assert_eq!(d.drive, 0.8);
                assert_eq!(d.tone, 0.55);
            }
            other => panic!("unexpected block {:?}", other),
        }
        match &preset.chain[2] {
            EffectBlock::Reverb(r) => {
                assert_eq!(r.algorithm, ReverbAlgorithm::Plate);
                assert_eq!(r.mix, 1.0, "mix should be clamped on parse");
            }
            other => panic!("unexpected block {:?}", other),
        }
    }

    #[test]
    fn unknown_block_is_rejected() {
        let json = r#"{"name": "x", "chain": [{"block": "wah"}]}"#;
        assert!(PresetData::from_json(json).is_err());
    }

    #[test]
    fn json_roundtrip_preserves_preset() {
        let preset = PresetData::new("Ambient Wash")
            .with_notes("long tails")
            .with_block(EffectBlock::Reverb(ReverbParams {
                algorithm: ReverbAlgorithm::Shimmer,
                ..ReverbParams::default()
            }));
        let json = preset.to_json().unwrap();
        assert_eq!(PresetData::from_json(&json).unwrap(), preset);
    }

    #[test]
    fn has_enabled_ignores_disabled_blocks() {
        let preset = PresetData::new("Clean").with_block(EffectBlock::Chorus(ChorusParams {
            enabled: false,
            ..ChorusParams::default()
        }));
        assert!(preset.block(BlockKind::Chorus).is_some());
        assert!(!preset.has_enabled(BlockKind::Chorus));
        assert!(!preset.has_enabled(BlockKind::Delay));
    }
}
