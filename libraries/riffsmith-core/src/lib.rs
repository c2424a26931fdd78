//! Riffsmith Core
//!
//! Platform-agnostic preset model shared by the DSP engine and the
//! generation scheduler.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Preset Types**: `PresetData` and the closed set of `EffectBlock`s
//! - **Parameter Ranges**: the valid range and default of every block parameter
//! - **Error Handling**: `PresetError` and `Result`
//!
//! # Example
//!
//! ```rust
//! use riffsmith_core::{DriveParams, DriveType, EffectBlock, PresetData};
//!
//! let preset = PresetData::new("Heavy Metal Rhythm").with_block(EffectBlock::Drive(DriveParams {
//!     drive: 0.8,
//!     drive_type: DriveType::HardClip,
//!     ..DriveParams::default()
//! }));
//!
//! assert!(preset.is_valid());
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod ranges;
pub mod types;

// Re-export commonly used types
pub use error::{PresetError, Result};
pub use ranges::ParamRange;
pub use types::{
    AmpModel, AmpParams, BlockKind, CabinetIr, CabinetParams, ChorusParams, ChorusWaveform,
    CompressorParams, DelayParams, DetectorMode, DriveParams, DriveType, EffectBlock, EqParams,
    GateMode, NoiseGateParams, PresetData, ReverbAlgorithm, ReverbParams,
};
