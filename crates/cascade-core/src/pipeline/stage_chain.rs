//! StageChain - コストと確信度でゲートされた多段分類
//!
//! Per segment, stages are tried in the task's traversal order:
//!
//! 1. skip if `running_cost + stage.cost > job_budget`
//! 2. skip if `check_condition` declines
//! 3. `classify`, charge the cost, `on_complete`
//!    (a NaN or infinite confidence is a stage error)
//! 4. `confidence > threshold` → `on_success`, done for this segment
//! 5. otherwise `on_failure`, next stage
//!
//! `running_cost` is owned by the caller and carried across the segments of
//! one task; it is not reset per segment.

use crate::domain::{CascadeError, PriorityOrder, StageResult, Task};

use super::descriptor::StageDescriptor;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.80;

const BELOW_THRESHOLD: &str = "Result below confidence threshold";

#[derive(Debug, Clone)]
pub struct StageChain {
    stages: Vec<StageDescriptor>,
    default_threshold: f64,
}

impl StageChain {
    pub fn new(stages: Vec<StageDescriptor>, default_threshold: f64) -> Self {
        Self {
            stages,
            default_threshold,
        }
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Stages in the order a task with `order` visits them.
    pub fn traverse(&self, order: PriorityOrder) -> Vec<&StageDescriptor> {
        match order {
            PriorityOrder::Ascending => self.stages.iter().collect(),
            PriorityOrder::Descending => self.stages.iter().rev().collect(),
        }
    }

    /// Run one segment through the chain.
    ///
    /// Returns the updated running cost and the accepted result, if any.
    /// Cost spent on stages that did not clear their threshold is kept.
    pub async fn classify_segment(
        &self,
        task: &Task,
        context: &[String],
        segment: &str,
        mut running_cost: u32,
    ) -> Result<(u32, Option<StageResult>), CascadeError> {
        for descriptor in self.traverse(task.priority_order) {
            let alias = descriptor.alias.as_str();
            let stage = &descriptor.stage;

            let affordable = running_cost
                .checked_add(descriptor.cost)
                .is_some_and(|total| total <= task.job_budget);
            if !affordable {
                tracing::debug!(
                    stage = alias,
                    cost = descriptor.cost,
                    running_cost,
                    job_budget = task.job_budget,
                    "skipped: over budget"
                );
                continue;
            }

            let applies = stage
                .check_condition(context, segment, task.is_partial)
                .await
                .map_err(|e| CascadeError::stage(alias, e))?;
            if !applies {
                tracing::debug!(stage = alias, "skipped: condition not met");
                continue;
            }

            let result = stage
                .classify(context, segment, task.is_partial)
                .await
                .map_err(|e| CascadeError::stage(alias, e))?;
            if !result.confidence.is_finite() {
                return Err(CascadeError::stage(
                    alias,
                    CascadeError::plugin(format!("non-finite confidence {}", result.confidence)),
                ));
            }
            running_cost += descriptor.cost;
            stage
                .on_complete(&result)
                .await
                .map_err(|e| CascadeError::stage(alias, e))?;

            let threshold = descriptor.threshold(self.default_threshold);
            if result.confidence > threshold {
                tracing::debug!(
                    stage = alias,
                    confidence = result.confidence,
                    threshold,
                    running_cost,
                    "accepted"
                );
                stage
                    .on_success(&result)
                    .await
                    .map_err(|e| CascadeError::stage(alias, e))?;
                return Ok((running_cost, Some(result)));
            }

            tracing::debug!(
                stage = alias,
                confidence = result.confidence,
                threshold,
                running_cost,
                "rejected: below threshold"
            );
            stage
                .on_failure(&result, BELOW_THRESHOLD)
                .await
                .map_err(|e| CascadeError::stage(alias, e))?;
        }

        Ok((running_cost, None))
    }
}
