//! ResultStore port - 完了/失敗したタスク結果の期限付き保存
//!
//! # 設計原則
//! - Entries expire `ttl` after they were written.
//! - A read never returns an entry past its expiry, even if no sweep ran.
//! - Each operation is a single map/key operation; callers need no extra locking.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{CascadeError, TaskId, TaskResult};

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Write or overwrite the entry for `task_id`. `None` uses the store's default TTL.
    async fn store(
        &self,
        task_id: TaskId,
        result: &TaskResult,
        ttl: Option<Duration>,
    ) -> Result<(), CascadeError>;

    /// `Ok(None)` means not found or expired.
    async fn get(&self, task_id: TaskId) -> Result<Option<TaskResult>, CascadeError>;

    /// Returns whether a live entry was removed.
    async fn delete(&self, task_id: TaskId) -> Result<bool, CascadeError>;

    async fn exists(&self, task_id: TaskId) -> Result<bool, CascadeError>;

    /// Stop background work owned by the store. Default: nothing to stop.
    async fn close(&self) {}
}
