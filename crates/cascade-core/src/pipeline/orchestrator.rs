//! Orchestrator - 1 タスクのライフサイクル
//!
//! # フロー
//! 1. TaskResult を `processing` で作成
//! 2. Segmentation → 各セグメントを StageChain へ（running_cost は持ち越し）
//! 3. 成功なら `completed`、途中のエラー/panic なら `failed`（部分結果は捨てる）
//! 4. 結果を ResultStore に必ず 1 回だけ書く
//! 5. callback_url があれば通知（失敗しても結果は変わらない）

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{CascadeError, ClassificationOutcome, Task, TaskResult};
use crate::ports::{CallbackNotifier, Clock, ResultStore, TaskHandler};

use super::descriptor::SegmenterDescriptor;
use super::segmentation::segment_content;
use super::stage_chain::StageChain;

/// The resolved, immutable plugin lists.
#[derive(Debug, Clone)]
pub struct Pipeline {
    segmenters: Vec<SegmenterDescriptor>,
    chain: StageChain,
}

impl Pipeline {
    pub fn new(segmenters: Vec<SegmenterDescriptor>, chain: StageChain) -> Self {
        Self { segmenters, chain }
    }

    pub fn segmenters(&self) -> &[SegmenterDescriptor] {
        &self.segmenters
    }

    pub fn chain(&self) -> &StageChain {
        &self.chain
    }

    /// Run every plugin's `on_startup`, segmenters first, in declared order.
    pub async fn startup(&self) -> Result<(), CascadeError> {
        for descriptor in &self.segmenters {
            descriptor
                .segmenter
                .on_startup()
                .await
                .map_err(|e| CascadeError::segmentation(&descriptor.alias, e))?;
            tracing::info!(segmenter = %descriptor.alias, "initialized segmenter");
        }
        for descriptor in self.chain.stages() {
            descriptor
                .stage
                .on_startup()
                .await
                .map_err(|e| CascadeError::stage(&descriptor.alias, e))?;
            tracing::info!(stage = %descriptor.alias, cost = descriptor.cost, "initialized stage");
        }
        Ok(())
    }

    /// Segment, then classify every segment in order.
    ///
    /// Only segments some stage accepted appear in the output. Any error
    /// aborts the whole task.
    pub async fn run(&self, task: &Task) -> Result<Vec<ClassificationOutcome>, CascadeError> {
        let segments = segment_content(&self.segmenters, &task.content).await?;
        let total = segments.len();

        let mut running_cost = 0;
        let mut outcomes = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            tracing::debug!(task_id = %task.task_id, segment = i + 1, total, running_cost, "classifying segment");

            let (spent, result) = self
                .chain
                .classify_segment(task, &segments[..i], segment, running_cost)
                .await?;
            running_cost = spent;

            match result {
                Some(eval) => outcomes.push(ClassificationOutcome {
                    segment: segment.clone(),
                    eval,
                }),
                None => {
                    tracing::debug!(task_id = %task.task_id, segment = i + 1, "no stage accepted segment");
                }
            }
        }

        tracing::debug!(task_id = %task.task_id, running_cost, accepted = outcomes.len(), "classification finished");
        Ok(outcomes)
    }
}

pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    results: Arc<dyn ResultStore>,
    notifier: Option<Arc<dyn CallbackNotifier>>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(pipeline: Arc<Pipeline>, results: Arc<dyn ResultStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pipeline,
            results,
            notifier: None,
            clock,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn CallbackNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Process one task to a terminal result, store it, then notify.
    ///
    /// Only a failed store write is returned as an error; classification
    /// failures end up inside the stored `TaskResult`.
    pub async fn process(&self, task: Task) -> Result<TaskResult, CascadeError> {
        let mut result = TaskResult::processing(&task, self.clock.now());
        tracing::info!(task_id = %task.task_id, budget = task.job_budget, order = ?task.priority_order, "processing task");

        // 別タスクで実行: plugin の panic も failed として記録できる
        let run = tokio::spawn({
            let pipeline = Arc::clone(&self.pipeline);
            let task = task.clone();
            async move { pipeline.run(&task).await }
        });

        match run.await {
            Ok(Ok(outcomes)) => result.mark_completed(outcomes),
            Ok(Err(e)) => {
                tracing::warn!(task_id = %task.task_id, error_kind = ?e.kind(), "task failed: {e}");
                result.mark_failed(e.to_string());
            }
            Err(join) => {
                let e = CascadeError::Aborted(if join.is_panic() {
                    "a plugin panicked".to_string()
                } else {
                    "classification was cancelled".to_string()
                });
                tracing::error!(task_id = %task.task_id, "task failed: {e}");
                result.mark_failed(e.to_string());
            }
        }

        self.results.store(task.task_id, &result, None).await?;
        tracing::info!(task_id = %task.task_id, status = ?result.status, "stored task result");

        if let (Some(url), Some(notifier)) = (task.callback_url.as_deref(), &self.notifier) {
            tracing::info!(task_id = %task.task_id, callback_url = url, "sending callback");
            notifier.notify(url, &result).await;
        }

        Ok(result)
    }
}

#[async_trait]
impl TaskHandler for Orchestrator {
    async fn handle(&self, task: Task) -> Result<(), CascadeError> {
        self.process(task).await.map(|_| ())
    }
}
