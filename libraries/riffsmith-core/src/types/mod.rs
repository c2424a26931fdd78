//! Preset domain types

mod blocks;
mod preset;

pub use blocks::{
    AmpModel, AmpParams, CabinetIr, CabinetParams, ChorusParams, ChorusWaveform, CompressorParams,
    DelayParams, DetectorMode, DriveParams, DriveType, EqParams, GateMode, NoiseGateParams,
    ReverbAlgorithm, ReverbParams,
};
pub use preset::{BlockKind, EffectBlock, PresetData};
