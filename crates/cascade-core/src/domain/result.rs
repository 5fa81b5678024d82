//! Task results: what the Result Store holds and what polling / callbacks see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Task, TaskId};

/// Lifecycle of a task result. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

fn default_confidence() -> f64 {
    0.5
}

/// What one stage returned for one segment.
///
/// `confidence` is the only field the core interprets. Everything else is
/// stage-specific and carried through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl StageResult {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            payload: serde_json::Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.get(key)
    }
}

/// A segment that some stage accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutcome {
    pub segment: String,
    pub eval: StageResult,
}

/// Result of one task.
///
/// Design:
/// - Created in `Processing` when orchestration starts.
/// - Transitions exactly once, via `mark_completed` or `mark_failed`.
/// - `results` only for completed, `error` only for failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ClassificationOutcome>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub is_partial: bool,
    pub timestamp: DateTime<Utc>,
}

impl TaskResult {
    pub fn processing(task: &Task, now: DateTime<Utc>) -> Self {
        Self {
            task_id: task.task_id,
            status: TaskStatus::Processing,
            results: None,
            error: None,
            is_partial: task.is_partial,
            timestamp: now,
        }
    }

    pub fn mark_completed(&mut self, outcomes: Vec<ClassificationOutcome>) {
        self.status = TaskStatus::Completed;
        self.results = Some(outcomes);
        self.error = None;
    }

    /// All-or-nothing: any outcomes gathered before the failure are dropped.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.results = None;
        self.error = Some(error.into());
    }
}
