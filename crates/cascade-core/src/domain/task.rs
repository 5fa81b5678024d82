//! Task - 投入されたジョブの入力スキーマ
//!
//! A `Task` is immutable once enqueued. It is the only thing that travels
//! through the queue, so it is also the wire format of the Redis backend.

use serde::{Deserialize, Serialize};

use super::TaskId;

/// Job kind. Closed set; only classification exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Classify,
}

/// Direction in which the stage chain is traversed for one task.
///
/// - `Ascending`: declared order (cheap filters first, typically)
/// - `Descending`: reversed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityOrder {
    #[default]
    Ascending,
    Descending,
}

pub const DEFAULT_JOB_BUDGET: u32 = 10;

fn default_job_budget() -> u32 {
    DEFAULT_JOB_BUDGET
}

/// One unit of submitted classification work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub job: JobKind,
    pub content: String,

    /// Content is a non-final incremental chunk.
    #[serde(default)]
    pub is_partial: bool,

    /// Ceiling on the cumulative cost of invoked stages.
    #[serde(default = "default_job_budget")]
    pub job_budget: u32,

    #[serde(default)]
    pub callback_url: Option<String>,

    #[serde(default)]
    pub priority_order: PriorityOrder,
}

impl Task {
    /// Convenience constructor: a classify task with every optional field at its default.
    pub fn classify(task_id: TaskId, content: impl Into<String>) -> Self {
        Self {
            task_id,
            job: JobKind::Classify,
            content: content.into(),
            is_partial: false,
            job_budget: DEFAULT_JOB_BUDGET,
            callback_url: None,
            priority_order: PriorityOrder::Ascending,
        }
    }

    pub fn with_budget(mut self, job_budget: u32) -> Self {
        self.job_budget = job_budget;
        self
    }

    pub fn with_priority_order(mut self, order: PriorityOrder) -> Self {
        self.priority_order = order;
        self
    }

    pub fn with_callback(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn partial(mut self) -> Self {
        self.is_partial = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_without_optional_fields_gets_defaults() {
        let json = r#"
        {
          "task_id": "6f1c1b1e-4a55-4a5b-9a51-1b2f7c0f7e11",
          "job": "classify",
          "content": "Hello. How are you?"
        }"#;
        let task: Task = serde_json::from_str(json).expect("deserialize");

        assert_eq!(task.job, JobKind::Classify);
        assert!(!task.is_partial);
        assert_eq!(task.job_budget, 10);
        assert_eq!(task.callback_url, None);
        assert_eq!(task.priority_order, PriorityOrder::Ascending);
    }

    #[test]
    fn submission_rejects_unknown_job_and_negative_budget() {
        let unknown_job = r#"{"task_id":"6f1c1b1e-4a55-4a5b-9a51-1b2f7c0f7e11","job":"summarize","content":"x"}"#;
        assert!(serde_json::from_str::<Task>(unknown_job).is_err());

        let negative = r#"{"task_id":"6f1c1b1e-4a55-4a5b-9a51-1b2f7c0f7e11","job":"classify","content":"x","job_budget":-1}"#;
        assert!(serde_json::from_str::<Task>(negative).is_err());
    }

    #[test]
    fn priority_order_uses_lowercase_names() {
        let s = serde_json::to_string(&PriorityOrder::Descending).unwrap();
        assert_eq!(s, "\"descending\"");
    }
}
