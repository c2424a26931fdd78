//! Preset generation backend

use crate::error::Result;
use riffsmith_core::PresetData;
use std::time::Duration;

/// Something that turns a description into a preset
///
/// Called from worker threads and allowed to block. Transport and retries
/// inside a single attempt belong to the implementation; the scheduler only
/// counts attempts.
pub trait PresetClient: Send + Sync {
    fn generate(&self, description: &str) -> Result<PresetData>;

    /// Generate with the scheduler's per-attempt deadline
    ///
    /// Backends that can bound their own transport should override this and
    /// give up once `timeout` has passed. The scheduler still treats an
    /// answer that arrives later than `timeout` as a timed-out attempt.
    fn generate_with_timeout(&self, description: &str, timeout: Duration) -> Result<PresetData> {
        let _ = timeout;
        self.generate(description)
    }
}

impl<F> PresetClient for F
where
    F: Fn(&str) -> Result<PresetData> + Send + Sync,
{
    fn generate(&self, description: &str) -> Result<PresetData> {
        self(description)
    }
}
