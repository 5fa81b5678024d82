//! TaskQueue port - 投入と実行を切り離す FIFO
//!
//! Two backends implement this: an in-process queue and a Redis list.
//! The worker loop and the orchestrator only ever see this trait.

use async_trait::async_trait;

use crate::domain::{CascadeError, Task};

/// Queue port (interface).
///
/// - `enqueue`: the task becomes available to exactly one future `dequeue`.
/// - `dequeue`: waits until a task is available. Dropping the returned
///   future cancels the wait; that is how the worker loop shuts down.
///
/// FIFO only for a single producer and single consumer. Concurrent producers
/// may interleave in any order.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: Task) -> Result<(), CascadeError>;

    async fn dequeue(&self) -> Result<Task, CascadeError>;
}
