//! RedisTaskQueue - Redis list を使った永続キュー
//!
//! LPUSH on enqueue, BRPOP on dequeue, so the list is FIFO. Consumption is
//! at-most-once per process: there is no lease/ack protocol, a task popped
//! by a worker that then dies is gone.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;

use crate::domain::{CascadeError, Task};
use crate::ports::TaskQueue;

pub const DEFAULT_LIST_NAME: &str = "cascade-tasks";

fn queue_err(e: redis::RedisError) -> CascadeError {
    CascadeError::Queue(e.to_string())
}

pub struct RedisTaskQueue {
    /// Shared connection for pushes.
    conn: MultiplexedConnection,
    /// BRPOP holds its connection until it returns, so it gets its own.
    blocking: Mutex<MultiplexedConnection>,
    list_name: String,
    poll_timeout: Duration,
}

impl RedisTaskQueue {
    /// Connect to `url`.
    ///
    /// `poll_timeout` bounds each BRPOP. `dequeue` loops over it, so the
    /// value only controls how long a cancelled wait can linger server side.
    pub async fn connect(
        url: &str,
        list_name: impl Into<String>,
        poll_timeout: Duration,
    ) -> Result<Self, CascadeError> {
        let client = redis::Client::open(url).map_err(queue_err)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(queue_err)?;
        let blocking = client
            .get_multiplexed_async_connection()
            .await
            .map_err(queue_err)?;

        Ok(Self {
            conn,
            blocking: Mutex::new(blocking),
            list_name: list_name.into(),
            poll_timeout,
        })
    }

    pub fn list_name(&self) -> &str {
        &self.list_name
    }
}

/// BRPOP timeout in seconds. Zero would mean "block forever", which
/// would make the wait uncancellable from the server's point of view.
fn brpop_timeout_secs(poll_timeout: Duration) -> f64 {
    poll_timeout.as_secs_f64().max(0.1)
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, task: Task) -> Result<(), CascadeError> {
        let payload = serde_json::to_string(&task)?;
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .lpush(&self.list_name, payload)
            .await
            .map_err(queue_err)?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Task, CascadeError> {
        let mut conn = self.blocking.lock().await;
        let timeout = brpop_timeout_secs(self.poll_timeout);
        loop {
            let popped: Option<(String, String)> = conn
                .brpop(&self.list_name, timeout)
                .await
                .map_err(queue_err)?;

            if let Some((_list, payload)) = popped {
                // A malformed item is consumed and reported; the worker logs and moves on.
                return Ok(serde_json::from_str(&payload)?);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_invalid_url() {
        let result = RedisTaskQueue::connect("not-a-redis-url", DEFAULT_LIST_NAME, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CascadeError::Queue(_))));
    }

    #[test]
    fn brpop_timeout_never_blocks_forever() {
        assert_eq!(brpop_timeout_secs(Duration::ZERO), 0.1);
        assert_eq!(brpop_timeout_secs(Duration::from_secs(2)), 2.0);
    }
}
