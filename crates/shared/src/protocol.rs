use serde::{Deserialize, Serialize};

use crate::domain::{Dialect, VdbName};

/// Per-operation request context for translate and forge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlQueryRequest {
    pub sql: String,
    pub dialect: Dialect,
    pub vdb: VdbName,
}

/// AI-produced failure analysis attached to translate/validate/forge outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<String>,
}

/// Success body of `POST /api/translate`; exactly one field is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateApiResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_analysis: Option<AiAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VqlValidateRequest {
    /// Original source SQL, for backend context.
    pub sql: String,
    pub vql: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VqlValidationApiResponse {
    pub validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_analysis: Option<AiAnalysis>,
}

/// One reported unit of progress in the forge stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStep {
    pub step_name: String,
    pub details: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Payload of the terminal `result` frame of the forge stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeResultPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_vql: Option<String>,
    pub is_valid: bool,
    pub final_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_analysis: Option<AiAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_log: Option<Vec<AgentStep>>,
}

/// Payload of an `error` frame of the forge stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeErrorPayload {
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdbOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VdbListResponse {
    pub results: Vec<VdbOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
}

/// Bookkeeping record posted when the user accepts a translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedQueryLog {
    pub source_sql: String,
    pub source_dialect: Dialect,
    pub target_vql: String,
}
