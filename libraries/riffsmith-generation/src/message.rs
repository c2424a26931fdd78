//! Messages posted by the scheduler to the control thread

use crate::request::RequestId;
use riffsmith_core::PresetData;
use std::time::Instant;

/// Scheduler notification
///
/// Every variant carries the instant it was posted.
#[derive(Debug, Clone)]
pub enum GenerationMessage {
    /// A request left the queue for its first attempt
    Started {
        request_id: RequestId,
        description: String,
        timestamp: Instant,
    },

    /// A preset was generated
    Generated {
        request_id: RequestId,
        description: String,
        preset: PresetData,
        /// Wall time of the successful attempt
        generation_ms: u64,
        timestamp: Instant,
    },

    /// All attempts failed
    Failed {
        request_id: RequestId,
        description: String,
        error: String,
        timestamp: Instant,
    },

    /// Free-form progress text
    StatusUpdate {
        text: String,
        progress: Option<f32>,
        timestamp: Instant,
    },
}

impl GenerationMessage {
    pub(crate) fn started(request_id: RequestId, description: &str) -> Self {
        Self::Started {
            request_id,
            description: description.to_string(),
            timestamp: Instant::now(),
        }
    }

    pub(crate) fn generated(
        request_id: RequestId,
        description: &str,
        preset: PresetData,
        generation_ms: u64,
    ) -> Self {
        Self::Generated {
            request_id,
            description: description.to_string(),
            preset,
            generation_ms,
            timestamp: Instant::now(),
        }
    }

    pub(crate) fn failed(request_id: RequestId, description: &str, error: String) -> Self {
        Self::Failed {
            request_id,
            description: description.to_string(),
            error,
            timestamp: Instant::now(),
        }
    }

    pub(crate) fn status(text: impl Into<String>, progress: Option<f32>) -> Self {
        Self::StatusUpdate {
            text: text.into(),
            progress: progress.map(|p| p.clamp(0.0, 1.0)),
            timestamp: Instant::now(),
        }
    }

    /// Request this message refers to, if any
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::Started { request_id, .. }
            | Self::Generated { request_id, .. }
            | Self::Failed { request_id, .. } => Some(*request_id),
            Self::StatusUpdate { .. } => None,
        }
    }

    pub fn timestamp(&self) -> Instant {
        match self {
            Self::Started { timestamp, .. }
            | Self::Generated { timestamp, .. }
            | Self::Failed { timestamp, .. }
            | Self::StatusUpdate { timestamp, .. } => *timestamp,
        }
    }

    /// Whether no further message will follow for this request
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Generated { .. } | Self::Failed { .. })
    }
}
