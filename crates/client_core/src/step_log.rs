//! Ordered, de-duplicated log of forge progress steps.

use shared::protocol::AgentStep;

/// One row of the progress log. `name` is the identity key: a long-running
/// step reported multiple times updates its row in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub name: String,
    pub details: String,
    pub success: bool,
    pub output: Option<String>,
}

impl From<AgentStep> for StepRecord {
    fn from(step: AgentStep) -> Self {
        Self {
            name: step.step_name,
            details: step.details,
            success: step.success,
            output: step.output,
        }
    }
}

/// Insertion-ordered step log with upsert-by-name semantics. The locally
/// accumulated log is a best-effort mirror; a `result` frame carrying an
/// explicit `process_log` replaces it wholesale via [`StepLog::adopt`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepLog {
    records: Vec<StepRecord>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entry with a matching name in place, preserving its
    /// position, or appends the record at the end.
    pub fn upsert(&mut self, record: StepRecord) {
        if let Some(existing) = self.records.iter_mut().find(|r| r.name == record.name) {
            *existing = record;
        } else {
            self.records.push(record);
        }
    }

    /// Replaces the accumulated log with the authoritative one from the
    /// backend's `result` frame.
    pub fn adopt(&mut self, steps: impl IntoIterator<Item = AgentStep>) {
        self.records = steps.into_iter().map(StepRecord::from).collect();
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
