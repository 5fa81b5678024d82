//! RedisResultStore - Redis のキー TTL に期限管理を任せる結果ストア
//!
//! No sweep loop: SET EX gives every key a native expiry, and Redis never
//! returns an expired key.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use crate::domain::{CascadeError, TaskId, TaskResult};
use crate::ports::ResultStore;

pub const DEFAULT_KEY_PREFIX: &str = "cascade-result:";

fn store_err(e: redis::RedisError) -> CascadeError {
    CascadeError::ResultStore(e.to_string())
}

pub struct RedisResultStore {
    conn: MultiplexedConnection,
    key_prefix: String,
    default_ttl: Duration,
}

impl RedisResultStore {
    pub async fn connect(
        url: &str,
        key_prefix: impl Into<String>,
        default_ttl: Duration,
    ) -> Result<Self, CascadeError> {
        let client = redis::Client::open(url).map_err(store_err)?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(store_err)?;
        Ok(Self {
            conn,
            key_prefix: key_prefix.into(),
            default_ttl,
        })
    }

    fn key(&self, task_id: TaskId) -> String {
        result_key(&self.key_prefix, task_id)
    }
}

fn result_key(prefix: &str, task_id: TaskId) -> String {
    format!("{prefix}{task_id}")
}

/// Whole seconds for SET EX, rounded up. Redis rejects an expiry of 0.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl ResultStore for RedisResultStore {
    async fn store(
        &self,
        task_id: TaskId,
        result: &TaskResult,
        ttl: Option<Duration>,
    ) -> Result<(), CascadeError> {
        let payload = serde_json::to_string(result)?;
        let secs = ttl_secs(ttl.unwrap_or(self.default_ttl));
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(task_id), payload, secs)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskResult>, CascadeError> {
        let mut conn = self.conn.clone();
        let data: Option<String> = conn.get(self.key(task_id)).await.map_err(store_err)?;
        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, task_id: TaskId) -> Result<bool, CascadeError> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(self.key(task_id)).await.map_err(store_err)?;
        Ok(deleted > 0)
    }

    async fn exists(&self, task_id: TaskId) -> Result<bool, CascadeError> {
        let mut conn = self.conn.clone();
        conn.exists(self.key(task_id)).await.map_err(store_err)
    }
}
