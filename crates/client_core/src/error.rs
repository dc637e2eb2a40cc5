use shared::protocol::AiAnalysis;
use thiserror::Error;

/// Failures a transport call can surface to the orchestrator.
///
/// `Analyzed` is the distinguishable signal for a failure the backend already
/// explained with an AI analysis; callers route it without inspecting HTTP
/// status codes. `UnexpectedFormat` marks a 2xx body that matches none of the
/// documented response shapes and is fatal for that operation.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(String),
    #[error("analyzed failure: {}", .0.explanation)]
    Analyzed(AiAnalysis),
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
