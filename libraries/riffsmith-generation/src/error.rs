//! Preset generation errors

use riffsmith_core::PresetError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using `GenerationError`
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Generation error types
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The preset client could not produce a preset
    #[error("Generation failed: {0}")]
    Client(String),

    /// The client answered after the configured request timeout
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    /// The client answered with an unusable preset
    #[error("Generated preset rejected: {0}")]
    InvalidPreset(#[from] PresetError),

    /// A worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// Invalid scheduler configuration
    #[error("Invalid scheduler configuration: {0}")]
    Config(String),
}

impl GenerationError {
    /// Create a client error
    pub fn client(msg: impl Into<String>) -> Self {
        Self::Client(msg.into())
    }
}
