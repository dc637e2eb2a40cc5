//! HTTP transport for the forge backend.
//!
//! One method per backend operation. The transport never mutates controller
//! state; it returns well-typed values or raises an [`ApiError`], and for the
//! streaming forge endpoint it only drives the observer callbacks.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header::ACCEPT, Client, Response};
use serde_json::from_value;
use shared::{
    error::ErrorBody,
    protocol::{
        AcceptedQueryLog, AgentStep, AiAnalysis, ForgeErrorPayload, ForgeResultPayload,
        HealthCheck, SqlQueryRequest, TranslateApiResponse, VdbListResponse, VdbOption,
        VqlValidateRequest, VqlValidationApiResponse,
    },
};
use tracing::{debug, warn};

use crate::{
    error::ApiError,
    sse::{FrameDecoder, StreamFrame},
};

/// A translate call lands in exactly one of these shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslateOutcome {
    Vql(String),
    Analysis(AiAnalysis),
    Info(String),
}

/// Typed view of a decoded forge frame.
#[derive(Debug, Clone)]
pub enum ForgeEvent {
    Step(AgentStep),
    Result(ForgeResultPayload),
    Error { detail: String },
}

/// Callbacks driven by [`SqlForgeApi::forge`]. Methods are async so an
/// implementor can lock shared state; they are awaited in decode order, and
/// `on_close` fires exactly once, strictly after the last `on_event` /
/// `on_transport_error`.
#[async_trait]
pub trait ForgeObserver: Send {
    async fn on_event(&mut self, event: ForgeEvent);
    async fn on_transport_error(&mut self, message: String);
    async fn on_close(&mut self);
}

#[async_trait]
pub trait SqlForgeApi: Send + Sync {
    async fn health(&self) -> Result<HealthCheck, ApiError>;
    async fn list_vdbs(&self) -> Result<Vec<VdbOption>, ApiError>;
    async fn translate(&self, request: &SqlQueryRequest) -> Result<TranslateOutcome, ApiError>;
    async fn validate(
        &self,
        request: &VqlValidateRequest,
    ) -> Result<VqlValidationApiResponse, ApiError>;
    async fn forge(&self, request: &SqlQueryRequest, observer: &mut dyn ForgeObserver);
    async fn log_accepted(&self, entry: &AcceptedQueryLog) -> Result<(), ApiError>;
}

pub struct HttpForgeApi {
    http: Client,
    base_url: String,
}

impl HttpForgeApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Best-effort message for a non-2xx response: structured `detail` or
    /// `message` field, then the raw text body, then the status reason.
    /// Always prefixed with the status code.
    async fn failure_message(response: Response) -> String {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.best_effort_message().map(str::to_string))
            .or_else(|| {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        format!("({}) {message}", status.as_u16())
    }
}

#[async_trait]
impl SqlForgeApi for HttpForgeApi {
    async fn health(&self) -> Result<HealthCheck, ApiError> {
        let response = self.http.get(self.url("/api/health")).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Transport(Self::failure_message(response).await));
        }
        Ok(response.json().await?)
    }

    async fn list_vdbs(&self) -> Result<Vec<VdbOption>, ApiError> {
        let response = self.http.get(self.url("/api/vdbs")).send().await?;
        if !response.status().is_success() {
            let message = Self::failure_message(response).await;
            return Err(ApiError::Transport(format!(
                "failed to fetch VDBs: {message}"
            )));
        }
        let body: VdbListResponse = response.json().await?;
        Ok(body.results)
    }

    async fn translate(&self, request: &SqlQueryRequest) -> Result<TranslateOutcome, ApiError> {
        let response = self
            .http
            .post(self.url("/api/translate"))
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Transport(Self::failure_message(response).await));
        }

        let body: TranslateApiResponse = response.json().await?;
        match (body.vql, body.error_analysis, body.message) {
            (Some(vql), None, None) => Ok(TranslateOutcome::Vql(vql)),
            (None, Some(analysis), None) => Ok(TranslateOutcome::Analysis(analysis)),
            (None, None, Some(message)) => Ok(TranslateOutcome::Info(message)),
            _ => Err(ApiError::UnexpectedFormat(
                "translation endpoint returned none or several of vql/error_analysis/message"
                    .to_string(),
            )),
        }
    }

    async fn validate(
        &self,
        request: &VqlValidateRequest,
    ) -> Result<VqlValidationApiResponse, ApiError> {
        let response = self
            .http
            .post(self.url("/api/validate"))
            .json(request)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        let Ok(body) = serde_json::from_str::<serde_json::Value>(&text) else {
            let fallback = if text.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed")
            } else {
                text.trim()
            };
            return Err(ApiError::Transport(format!(
                "({}) server returned non-JSON response: {fallback}",
                status.as_u16()
            )));
        };

        if !status.is_success() {
            // A failed validation that carries an AI analysis is a
            // distinguishable signal, not a plain transport failure.
            let error_body: ErrorBody = from_value(body).unwrap_or_default();
            if let Some(analysis) = error_body.error_analysis {
                return Err(ApiError::Analyzed(analysis));
            }
            let message = error_body
                .best_effort_message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("validation request failed: {}", status.as_u16()));
            return Err(ApiError::Transport(message));
        }

        from_value(body).map_err(|err| {
            ApiError::UnexpectedFormat(format!("malformed validation response: {err}"))
        })
    }

    async fn forge(&self, request: &SqlQueryRequest, observer: &mut dyn ForgeObserver) {
        let response = match self
            .http
            .post(self.url("/api/forge"))
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                observer
                    .on_transport_error(format!("forge request failed: {err}"))
                    .await;
                observer.on_close().await;
                return;
            }
        };

        if !response.status().is_success() {
            let message = Self::failure_message(response).await;
            observer.on_transport_error(message).await;
            observer.on_close().await;
            return;
        }

        let mut stream = response.bytes_stream();
        let mut decoder = FrameDecoder::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    // Deliver every frame decodable from the current buffer
                    // before the next read suspends.
                    for frame in decoder.push(&bytes) {
                        if let Some(event) = typed_forge_event(frame) {
                            observer.on_event(event).await;
                        }
                    }
                }
                Err(err) => {
                    observer
                        .on_transport_error(format!("forge stream read failed: {err}"))
                        .await;
                    break;
                }
            }
        }

        if decoder.pending_len() > 0 {
            debug!(
                pending_bytes = decoder.pending_len(),
                "discarding unterminated trailing forge frame"
            );
        }
        if decoder.decode_error_count() > 0 {
            warn!(
                count = decoder.decode_error_count(),
                "forge stream contained malformed frames"
            );
        }
        observer.on_close().await;
    }

    async fn log_accepted(&self, entry: &AcceptedQueryLog) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("/api/log/accepted"))
            .json(entry)
            .send()
            .await?;
        if !response.status().is_success() {
            let message = Self::failure_message(response).await;
            return Err(ApiError::Transport(format!(
                "failed to log accepted query: {message}"
            )));
        }
        Ok(())
    }
}

fn typed_forge_event(frame: StreamFrame) -> Option<ForgeEvent> {
    match frame.event.as_str() {
        "step" => match from_value::<AgentStep>(frame.data) {
            Ok(step) => Some(ForgeEvent::Step(step)),
            Err(err) => {
                warn!(%err, "dropping step frame with malformed payload");
                None
            }
        },
        "result" => match from_value::<ForgeResultPayload>(frame.data) {
            Ok(result) => Some(ForgeEvent::Result(result)),
            Err(err) => {
                warn!(%err, "dropping result frame with malformed payload");
                None
            }
        },
        "error" => match from_value::<ForgeErrorPayload>(frame.data) {
            Ok(payload) => Some(ForgeEvent::Error {
                detail: payload.detail,
            }),
            Err(err) => {
                warn!(%err, "dropping error frame with malformed payload");
                None
            }
        },
        other => {
            debug!(event = other, "ignoring forge frame with unknown event tag");
            None
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
