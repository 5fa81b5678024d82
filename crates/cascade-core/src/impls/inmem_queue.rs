//! InMemoryTaskQueue - プロセス内キュー（外部依存なし）
//!
//! Contents are lost on process exit.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::domain::{CascadeError, Task};
use crate::ports::TaskQueue;

/// In-process FIFO.
///
/// # 実装詳細
/// - `Mutex<VecDeque<Task>>` holds the ready tasks
/// - `Notify` wakes a waiting `dequeue` on `enqueue`
///
/// `Notify::notify_one` keeps a permit when nobody is waiting yet, so an
/// enqueue that lands between "queue was empty" and "start waiting" is not lost.
pub struct InMemoryTaskQueue {
    ready: Mutex<VecDeque<Task>>,
    notify: Notify,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Number of tasks waiting to be dequeued.
    pub async fn len(&self) -> usize {
        self.ready.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ready.lock().await.is_empty()
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: Task) -> Result<(), CascadeError> {
        let mut ready = self.ready.lock().await;
        ready.push_back(task);

        // Notify waiting workers
        drop(ready);
        self.notify.notify_one();

        Ok(())
    }

    async fn dequeue(&self) -> Result<Task, CascadeError> {
        loop {
            {
                let mut ready = self.ready.lock().await;
                if let Some(task) = ready.pop_front() {
                    return Ok(task);
                }
            }
            self.notify.notified().await;
        }
    }
}
