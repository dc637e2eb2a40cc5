use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{Dialect, VdbName},
    protocol::{AcceptedQueryLog, AiAnalysis, HealthCheck, SqlQueryRequest, VdbOption,
        VqlValidateRequest},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod sse;
pub mod step_log;
pub mod transport;

use error::ApiError;
use step_log::{StepLog, StepRecord};
use transport::{ForgeEvent, ForgeObserver, HttpForgeApi, SqlForgeApi, TranslateOutcome};

const MISSING_SELECTION_ERROR: &str = "Source Dialect and VDB must be selected.";
const EMPTY_VQL_ERROR: &str = "Cannot validate empty VQL.";
const RESOLVE_TRANSLATION_FIRST: &str =
    "Resolve the translation error (Apply or Dismiss) before validating.";
const DISMISS_VALIDATION_ANALYSIS: &str =
    "Dismiss the current validation analysis before validating again.";
const CONVERT_FIRST: &str = "Convert the SQL to VQL first or resolve conversion errors.";
const VALIDATION_SUCCESS_DEFAULT: &str = "VQL syntax check successful!";
const VALIDATION_REJECTED_DEFAULT: &str =
    "Validation Failed: the target system rejected the query syntax/plan.";
const TRANSLATION_STEP_NAME: &str = "Translate";

/// Outcome of one channel (translation or validation). At most one value is
/// live per channel; terminal values return to `Idle` only via an explicit
/// dismiss or the start of a conflicting operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Outcome {
    #[default]
    Idle,
    /// Operation produced a usable result: the translated text on the
    /// translation channel, the validation message on the validation channel.
    Success { message: String },
    /// Unstructured failure: network, malformed response, generic backend
    /// message.
    PlainError { message: String },
    /// Structured failure with an AI explanation and optional suggestion.
    Analyzed(AiAnalysis),
    /// Operation was skipped or short-circuited; not a failure.
    Info { message: String },
}

impl Outcome {
    pub fn is_idle(&self) -> bool {
        matches!(self, Outcome::Idle)
    }

    pub fn is_analyzed(&self) -> bool {
        matches!(self, Outcome::Analyzed(_))
    }
}

/// The translated-text slot. Only `Vql` holds text that validation may use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TargetBuffer {
    #[default]
    Placeholder,
    ConversionFailed,
    Vql(String),
}

impl TargetBuffer {
    pub fn vql(&self) -> Option<&str> {
        match self {
            TargetBuffer::Vql(text) => Some(text),
            _ => None,
        }
    }
}

/// State change notifications for a rendering collaborator.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    TranslationChanged(Outcome),
    ValidationChanged(Outcome),
    ForgeStep(StepRecord),
    ForgeLogReady(Vec<StepRecord>),
    VdbOptionsLoaded(Vec<VdbOption>),
}

/// Cloned view of the controller state for display.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub source_sql: String,
    pub dialect: Option<Dialect>,
    pub vdb: Option<VdbName>,
    pub target: TargetBuffer,
    pub translation: Outcome,
    pub validation: Outcome,
    pub busy: bool,
    pub current_step: Option<StepRecord>,
    pub live_log: Vec<StepRecord>,
    pub final_log: Option<Vec<StepRecord>>,
    pub vdb_options: Vec<VdbOption>,
}

#[derive(Debug, Default)]
struct ForgeClientState {
    source_sql: String,
    dialect: Option<Dialect>,
    vdb: Option<VdbName>,
    target: TargetBuffer,
    translation: Outcome,
    validation: Outcome,
    translating: bool,
    validating: bool,
    forging: bool,
    loading_vdbs: bool,
    current_step: Option<StepRecord>,
    live_log: StepLog,
    final_log: Option<Vec<StepRecord>>,
    vdb_options: Vec<VdbOption>,
    translate_epoch: u64,
    validate_epoch: u64,
    forge_epoch: u64,
}

impl ForgeClientState {
    fn busy(&self) -> bool {
        self.translating || self.validating || self.forging || self.loading_vdbs
    }
}

/// Orchestrates translate, validate and forge operations against the backend
/// and reduces their layered outcomes into the two channel states.
///
/// One transport call may be in flight per operation kind; starting an
/// operation while another is running is a caller bug and is refused with a
/// warning. A completion belonging to a superseded operation is dropped via
/// per-kind epoch counters.
pub struct ForgeClient {
    api: Arc<dyn SqlForgeApi>,
    inner: Mutex<ForgeClientState>,
    events: broadcast::Sender<SessionEvent>,
}

impl ForgeClient {
    pub fn new(base_url: impl Into<String>) -> Arc<Self> {
        Self::with_api(Arc::new(HttpForgeApi::new(base_url)))
    }

    pub fn with_api(api: Arc<dyn SqlForgeApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            inner: Mutex::new(ForgeClientState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock().await;
        SessionSnapshot {
            source_sql: state.source_sql.clone(),
            dialect: state.dialect.clone(),
            vdb: state.vdb.clone(),
            target: state.target.clone(),
            translation: state.translation.clone(),
            validation: state.validation.clone(),
            busy: state.busy(),
            current_step: state.current_step.clone(),
            live_log: state.live_log.records().to_vec(),
            final_log: state.final_log.clone(),
            vdb_options: state.vdb_options.clone(),
        }
    }

    // --- input setters, clearing stale outcomes the way the UI handlers do ---

    pub async fn set_source_sql(&self, sql: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.source_sql = sql.into();
        self.set_translation(&mut state, Outcome::Idle);
        self.set_validation(&mut state, Outcome::Idle);
    }

    pub async fn set_dialect(&self, dialect: Option<Dialect>) {
        let mut state = self.inner.lock().await;
        state.dialect = dialect;
        self.set_translation(&mut state, Outcome::Idle);
        self.set_validation(&mut state, Outcome::Idle);
    }

    /// Changing the target VDB also invalidates any translated text.
    pub async fn set_vdb(&self, vdb: Option<VdbName>) {
        let mut state = self.inner.lock().await;
        state.vdb = vdb;
        state.target = TargetBuffer::Placeholder;
        self.set_translation(&mut state, Outcome::Idle);
        self.set_validation(&mut state, Outcome::Idle);
    }

    /// Applies an AI-suggested rewrite of the source SQL and resolves the
    /// translation analysis that carried it.
    pub async fn apply_sql_suggestion(&self, suggestion: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.source_sql = suggestion.into();
        state.target = TargetBuffer::Placeholder;
        self.set_translation(&mut state, Outcome::Idle);
        self.set_validation(&mut state, Outcome::Idle);
    }

    /// Applies an AI-suggested corrected VQL to the target slot and resolves
    /// the validation analysis that carried it.
    pub async fn apply_vql_suggestion(&self, vql: impl Into<String>) {
        let mut state = self.inner.lock().await;
        state.target = TargetBuffer::Vql(vql.into());
        self.set_validation(&mut state, Outcome::Idle);
    }

    pub async fn dismiss_translation_outcome(&self) {
        let mut state = self.inner.lock().await;
        self.set_translation(&mut state, Outcome::Idle);
    }

    pub async fn dismiss_validation_outcome(&self) {
        let mut state = self.inner.lock().await;
        self.set_validation(&mut state, Outcome::Idle);
    }

    pub async fn dismiss_forge_log(&self) {
        let mut state = self.inner.lock().await;
        state.final_log = None;
        state.live_log.clear();
        state.current_step = None;
    }

    // --- operations ---

    pub async fn health(&self) -> Result<HealthCheck, ApiError> {
        self.api.health().await
    }

    pub async fn load_vdb_options(&self) {
        {
            let mut state = self.inner.lock().await;
            if state.busy() {
                warn!("ignoring load_vdb_options while another operation is running");
                return;
            }
            state.loading_vdbs = true;
        }

        let result = self.api.list_vdbs().await;

        let mut state = self.inner.lock().await;
        state.loading_vdbs = false;
        match result {
            Ok(options) => {
                state.vdb_options = options.clone();
                let _ = self.events.send(SessionEvent::VdbOptionsLoaded(options));
            }
            Err(err) => {
                self.set_translation(
                    &mut state,
                    Outcome::PlainError {
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    /// Translate the source SQL to VQL.
    pub async fn convert(&self) {
        let (request, epoch) = {
            let mut state = self.inner.lock().await;
            if state.busy() {
                warn!("ignoring convert while another operation is running");
                return;
            }
            self.set_translation(&mut state, Outcome::Idle);
            self.set_validation(&mut state, Outcome::Idle);

            let (Some(dialect), Some(vdb)) = (state.dialect.clone(), state.vdb.clone()) else {
                self.set_translation(
                    &mut state,
                    Outcome::PlainError {
                        message: MISSING_SELECTION_ERROR.to_string(),
                    },
                );
                return;
            };

            state.translating = true;
            state.translate_epoch += 1;
            (
                SqlQueryRequest {
                    sql: state.source_sql.clone(),
                    dialect,
                    vdb,
                },
                state.translate_epoch,
            )
        };

        let result = self.api.translate(&request).await;

        let mut state = self.inner.lock().await;
        if state.translate_epoch != epoch {
            info!("discarding superseded translate completion");
            return;
        }
        state.translating = false;
        match result {
            Ok(TranslateOutcome::Vql(vql)) => {
                state.target = TargetBuffer::Vql(vql.clone());
                self.set_translation(&mut state, Outcome::Success { message: vql });
            }
            Ok(TranslateOutcome::Analysis(analysis)) => {
                state.target = TargetBuffer::Placeholder;
                self.set_translation(&mut state, Outcome::Analyzed(analysis));
            }
            Ok(TranslateOutcome::Info(message)) => {
                state.target = TargetBuffer::Placeholder;
                self.set_translation(
                    &mut state,
                    Outcome::Info {
                        message: format!("Translation Info: {message}"),
                    },
                );
            }
            Err(err) => {
                state.target = TargetBuffer::ConversionFailed;
                self.set_translation(
                    &mut state,
                    Outcome::PlainError {
                        message: err.to_string(),
                    },
                );
            }
        }
    }

    /// Validate the current target VQL against the backend.
    ///
    /// Guards run in a fixed order before any request is issued: an
    /// unresolved translation analysis, then an unresolved validation
    /// analysis, then a missing translation, then the local empty-text check.
    pub async fn validate_query(&self) {
        let (request, epoch) = {
            let mut state = self.inner.lock().await;
            if state.busy() {
                warn!("ignoring validate_query while another operation is running");
                return;
            }

            if state.translation.is_analyzed() {
                self.set_validation(
                    &mut state,
                    Outcome::Info {
                        message: RESOLVE_TRANSLATION_FIRST.to_string(),
                    },
                );
                return;
            }
            if state.validation.is_analyzed() {
                self.set_validation(
                    &mut state,
                    Outcome::Info {
                        message: DISMISS_VALIDATION_ANALYSIS.to_string(),
                    },
                );
                return;
            }
            let Some(vql) = state.target.vql().map(str::to_string) else {
                self.set_validation(
                    &mut state,
                    Outcome::Info {
                        message: CONVERT_FIRST.to_string(),
                    },
                );
                return;
            };

            let vql = normalize_line_breaks(&vql);
            if vql.is_empty() {
                self.set_validation(
                    &mut state,
                    Outcome::PlainError {
                        message: EMPTY_VQL_ERROR.to_string(),
                    },
                );
                return;
            }

            self.set_validation(&mut state, Outcome::Idle);
            // Stale general errors are cleared, but a translation Success
            // stays live; the channels are independent.
            if matches!(
                state.translation,
                Outcome::PlainError { .. } | Outcome::Info { .. }
            ) {
                self.set_translation(&mut state, Outcome::Idle);
            }
            state.validating = true;
            state.validate_epoch += 1;
            (
                VqlValidateRequest {
                    sql: state.source_sql.clone(),
                    vql,
                },
                state.validate_epoch,
            )
        };

        let result = self.api.validate(&request).await;

        let mut state = self.inner.lock().await;
        if state.validate_epoch != epoch {
            info!("discarding superseded validate completion");
            return;
        }
        state.validating = false;
        match result {
            Ok(report) if report.validated => {
                let message = report
                    .message
                    .unwrap_or_else(|| VALIDATION_SUCCESS_DEFAULT.to_string());
                self.set_validation(&mut state, Outcome::Success { message });
            }
            Ok(report) => match report.error_analysis {
                Some(analysis) => self.set_validation(&mut state, Outcome::Analyzed(analysis)),
                None => {
                    let message = report
                        .message
                        .unwrap_or_else(|| VALIDATION_REJECTED_DEFAULT.to_string());
                    self.set_validation(&mut state, Outcome::PlainError { message });
                }
            },
            Err(ApiError::Analyzed(analysis)) => {
                self.set_validation(&mut state, Outcome::Analyzed(analysis));
            }
            Err(err) => {
                self.set_validation(
                    &mut state,
                    Outcome::PlainError {
                        message: format!("Validation Process Error: {err}"),
                    },
                );
            }
        }
    }

    /// Run the multi-step agentic translate-validate-correct loop.
    pub async fn forge(self: &Arc<Self>) {
        let (request, epoch) = {
            let mut state = self.inner.lock().await;
            if state.busy() {
                warn!("ignoring forge while another operation is running");
                return;
            }
            self.set_translation(&mut state, Outcome::Idle);
            self.set_validation(&mut state, Outcome::Idle);

            let (Some(dialect), Some(vdb)) = (state.dialect.clone(), state.vdb.clone()) else {
                self.set_translation(
                    &mut state,
                    Outcome::PlainError {
                        message: MISSING_SELECTION_ERROR.to_string(),
                    },
                );
                return;
            };

            state.live_log.clear();
            state.final_log = None;
            state.current_step = None;
            state.forging = true;
            state.forge_epoch += 1;
            (
                SqlQueryRequest {
                    sql: state.source_sql.clone(),
                    dialect,
                    vdb,
                },
                state.forge_epoch,
            )
        };

        let mut run = ForgeRun {
            client: Arc::clone(self),
            epoch,
        };
        self.api.forge(&request, &mut run).await;
    }

    /// Record the current source/target pair as an accepted translation.
    pub async fn accept_translation(&self) -> Result<(), ApiError> {
        let entry = {
            let state = self.inner.lock().await;
            let (Some(dialect), Some(vql)) = (state.dialect.clone(), state.target.vql()) else {
                return Err(ApiError::Transport(
                    "no accepted translation to record".to_string(),
                ));
            };
            AcceptedQueryLog {
                source_sql: state.source_sql.clone(),
                source_dialect: dialect,
                target_vql: vql.to_string(),
            }
        };
        self.api.log_accepted(&entry).await
    }

    // --- forge stream continuations ---

    async fn apply_forge_event(&self, epoch: u64, event: ForgeEvent) {
        let mut state = self.inner.lock().await;
        if state.forge_epoch != epoch {
            info!("discarding forge frame from a superseded run");
            return;
        }
        match event {
            ForgeEvent::Step(step) => {
                let record = StepRecord::from(step);
                state.live_log.upsert(record.clone());
                state.current_step = Some(record.clone());
                let _ = self.events.send(SessionEvent::ForgeStep(record));
            }
            ForgeEvent::Result(result) => {
                if let Some(log) = result.process_log {
                    state.live_log.adopt(log);
                }
                // The final log is displayable regardless of outcome.
                let final_log = state.live_log.records().to_vec();
                state.final_log = Some(final_log.clone());
                let _ = self.events.send(SessionEvent::ForgeLogReady(final_log));

                if result.is_valid {
                    if let Some(vql) = result.final_vql {
                        state.target = TargetBuffer::Vql(vql.clone());
                        self.set_translation(&mut state, Outcome::Success { message: vql });
                    }
                    self.set_validation(
                        &mut state,
                        Outcome::Success {
                            message: result.final_message,
                        },
                    );
                } else if let Some(analysis) = result.error_analysis {
                    if translation_step_failed(
                        state.live_log.records(),
                        result.final_vql.is_none(),
                    ) {
                        state.target = TargetBuffer::Placeholder;
                        self.set_translation(&mut state, Outcome::Analyzed(analysis));
                    } else {
                        if let Some(vql) = result.final_vql {
                            state.target = TargetBuffer::Vql(vql);
                        }
                        self.set_validation(&mut state, Outcome::Analyzed(analysis));
                    }
                } else {
                    self.set_translation(
                        &mut state,
                        Outcome::PlainError {
                            message: result.final_message,
                        },
                    );
                }
            }
            ForgeEvent::Error { detail } => {
                // No result frame will arrive; the running flag must not
                // stay set.
                state.forging = false;
                self.set_translation(&mut state, Outcome::PlainError { message: detail });
            }
        }
    }

    async fn apply_forge_failure(&self, epoch: u64, message: String) {
        let mut state = self.inner.lock().await;
        if state.forge_epoch != epoch {
            return;
        }
        state.forging = false;
        self.set_translation(&mut state, Outcome::PlainError { message });
    }

    async fn finish_forge(&self, epoch: u64) {
        let mut state = self.inner.lock().await;
        if state.forge_epoch != epoch {
            return;
        }
        state.forging = false;
        state.current_step = None;
    }

    fn set_translation(&self, state: &mut ForgeClientState, outcome: Outcome) {
        state.translation = outcome.clone();
        let _ = self.events.send(SessionEvent::TranslationChanged(outcome));
    }

    fn set_validation(&self, state: &mut ForgeClientState, outcome: Outcome) {
        state.validation = outcome.clone();
        let _ = self.events.send(SessionEvent::ValidationChanged(outcome));
    }
}

struct ForgeRun {
    client: Arc<ForgeClient>,
    epoch: u64,
}

#[async_trait]
impl ForgeObserver for ForgeRun {
    async fn on_event(&mut self, event: ForgeEvent) {
        self.client.apply_forge_event(self.epoch, event).await;
    }

    async fn on_transport_error(&mut self, message: String) {
        self.client.apply_forge_failure(self.epoch, message).await;
    }

    async fn on_close(&mut self) {
        self.client.finish_forge(self.epoch).await;
    }
}

/// The failing step is the translation step when the last unsuccessful log
/// entry is named "Translate", or, with no failing entry to go by, when the
/// run produced no VQL at all.
fn translation_step_failed(log: &[StepRecord], no_final_vql: bool) -> bool {
    log.iter()
        .rev()
        .find(|record| !record.success)
        .map(|record| record.name == TRANSLATION_STEP_NAME)
        .unwrap_or(no_final_vql)
}

/// Collapses line breaks to single spaces and trims, matching what the
/// backend validator expects to receive.
fn normalize_line_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_break = false;
    for ch in text.chars() {
        if ch == '\r' || ch == '\n' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(ch);
            in_break = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
