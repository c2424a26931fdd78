//! Preset model errors

use thiserror::Error;

/// Result type alias using `PresetError`
pub type Result<T> = std::result::Result<T, PresetError>;

/// Preset error type
#[derive(Error, Debug)]
pub enum PresetError {
    /// Preset has no name or no blocks
    #[error("Invalid preset: {0}")]
    InvalidPreset(String),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl PresetError {
    /// Create an invalid preset error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidPreset(msg.into())
    }
}
