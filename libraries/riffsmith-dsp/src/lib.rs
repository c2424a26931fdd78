//! Riffsmith DSP
//!
//! Real-time guitar signal chain with click-free parameter smoothing.
//!
//! This crate provides:
//! - Effect units (gate, compressor, drive, amp, cabinet, chorus, delay,
//!   reverb, EQ) behind the [`EffectUnit`] contract
//! - [`DspChain`]: the fixed guitar topology with chain gain, tone and bypass
//! - [`SmoothedParameterSet`]: lock-free target bus with linear ramps and
//!   bulk transitions
//! - [`ToneProcessor`]: chain plus smoothing, with preset mapping
//!
//! # Real-Time Rules
//!
//! `process_block` never allocates, locks or logs. Parameters are plain
//! atomics written from any thread and read once per block.
//!
//! # Example
//!
//! ```rust
//! use riffsmith_core::PresetData;
//! use riffsmith_dsp::{AudioBuffer, ToneProcessor};
//!
//! # fn main() -> riffsmith_dsp::Result<()> {
//! let mut processor = ToneProcessor::new()?;
//! processor.prepare_to_play(48_000.0, 256, 2)?;
//!
//! // Control thread
//! let handle = processor.handle();
//! handle.apply_preset(&PresetData::new("Heavy Metal Rhythm"))?;
//!
//! // Audio thread
//! let mut buffer = AudioBuffer::new(2, 256);
//! processor.process_block(&mut buffer);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod buffer;
pub mod chain;
pub mod effects;
mod error;
pub mod mapping;
pub mod params;
pub mod primitives;
pub mod processor;
pub mod smoothing;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use buffer::{AudioBuffer, ProcessSpec, MAX_CHANNELS};
pub use chain::{BypassState, ChainHandle, ChainParameters, DspChain};
pub use effects::{EffectUnit, UnitState};
pub use error::{DspError, Result};
pub use mapping::PresetMapping;
pub use params::{AtomicF32, Parameter, CHANGE_TOLERANCE};
pub use processor::{ToneHandle, ToneProcessor};
pub use smoothing::{
    LinearRamp, ParamId, SmoothedParameterSet, SmootherHandle, BULK_RAMP_SECONDS,
    DEFAULT_RAMP_SECONDS, SMOOTHING_EPSILON,
};
