//! Generation requests

use std::fmt;
use std::time::Instant;

/// Identifier handed out by the scheduler, unique per scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One queued generation
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub id: RequestId,
    pub description: String,
    pub submitted_at: Instant,
    /// Attempts already made and failed
    pub retry_count: u32,
    pub is_variation: bool,
    /// Original description a variation was derived from
    pub base_prompt: Option<String>,
}

impl GenerationRequest {
    pub fn new(id: RequestId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            submitted_at: Instant::now(),
            retry_count: 0,
            is_variation: false,
            base_prompt: None,
        }
    }

    /// Builder: mark as a variation of `base`
    pub fn variation_of(mut self, base: impl Into<String>) -> Self {
        self.is_variation = true;
        self.base_prompt = Some(base.into());
        self
    }

    pub fn is_first_attempt(&self) -> bool {
        self.retry_count == 0
    }

    /// Description shortened for log lines
    pub(crate) fn summary(&self) -> String {
        const MAX_CHARS: usize = 30;
        if self.description.chars().count() <= MAX_CHARS {
            self.description.clone()
        } else {
            let short: String = self.description.chars().take(MAX_CHARS).collect();
            format!("{short}...")
        }
    }
}
