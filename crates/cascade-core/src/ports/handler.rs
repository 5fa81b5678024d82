//! TaskHandler port - what the worker loop invokes for each dequeued task.

use async_trait::async_trait;

use crate::domain::{CascadeError, Task};

#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: Task) -> Result<(), CascadeError>;
}
