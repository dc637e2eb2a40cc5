use serde::{Deserialize, Serialize};

use crate::protocol::AiAnalysis;

/// Error body shape the backend uses for non-2xx responses. FastAPI-style
/// services report `detail`; some handlers report `message` instead, and a
/// failed validation may additionally carry an `error_analysis`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_analysis: Option<AiAnalysis>,
}

impl ErrorBody {
    /// Best-effort human-readable message: `detail`, then `message`.
    pub fn best_effort_message(&self) -> Option<&str> {
        self.detail
            .as_deref()
            .or(self.message.as_deref())
            .filter(|s| !s.is_empty())
    }
}
