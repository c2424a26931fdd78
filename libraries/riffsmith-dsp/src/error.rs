//! DSP engine errors
//!
//! None of these are produced on the audio path; they surface from setup
//! (`ProcessSpec` construction, parameter registration) and from control-side
//! calls on the smoothing bus.

use thiserror::Error;

/// Result type alias using `DspError`
pub type Result<T> = std::result::Result<T, DspError>;

/// DSP error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DspError {
    /// Sample rate, block size or channel count out of range
    #[error("Invalid process spec: {0}")]
    InvalidProcessSpec(String),

    /// Parameter id was never registered
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Parameter id registered twice
    #[error("Duplicate parameter: {0}")]
    DuplicateParameter(String),

    /// Parameters can only be registered before control handles exist
    #[error("Cannot register parameter '{0}': control handles already issued")]
    ParametersShared(String),

    /// NaN or infinite target
    #[error("Non-finite value for parameter '{0}'")]
    NonFiniteValue(String),
}
