//! Stage port - 分類ステージのプラグインインターフェース
//!
//! A stage is one classifier in the chain (regex matcher, lookup table,
//! local model, remote LLM, ...). The chain decides *whether* a stage runs
//! based on budget and `check_condition`; the stage only decides *what*.
//!
//! Lifecycle per invocation:
//! `check_condition` → `classify` → `on_complete` → (`on_success` | `on_failure`)

use async_trait::async_trait;

use crate::domain::{CascadeError, StageResult};

#[async_trait]
pub trait Stage: Send + Sync {
    /// Called once at process start, before any task is processed.
    async fn on_startup(&self) -> Result<(), CascadeError> {
        Ok(())
    }

    /// Cheap precondition. Default: the segment is not blank.
    ///
    /// `context` holds the segments of the same task processed before this one.
    async fn check_condition(
        &self,
        _context: &[String],
        segment: &str,
        _is_partial: bool,
    ) -> Result<bool, CascadeError> {
        Ok(!segment.trim().is_empty())
    }

    async fn classify(
        &self,
        context: &[String],
        segment: &str,
        is_partial: bool,
    ) -> Result<StageResult, CascadeError>;

    /// After every `classify`, before the threshold decision.
    async fn on_complete(&self, _result: &StageResult) -> Result<(), CascadeError> {
        Ok(())
    }

    /// The result cleared this stage's threshold and is final for the segment.
    async fn on_success(&self, _result: &StageResult) -> Result<(), CascadeError> {
        Ok(())
    }

    /// The result did not clear the threshold; the chain moves on.
    async fn on_failure(&self, _result: &StageResult, _reason: &str) -> Result<(), CascadeError> {
        Ok(())
    }
}
