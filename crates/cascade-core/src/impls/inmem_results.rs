//! InMemoryResultStore - 期限付きのプロセス内結果ストア
//!
//! Expiry is checked on every read, and a sweep loop (started separately)
//! drops entries nobody ever polls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::sweep_loop::{Sweep, SweepLoop};
use crate::domain::{CascadeError, TaskId, TaskResult};
use crate::ports::clock::add_duration;
use crate::ports::{Clock, ResultStore};

pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct StoredEntry {
    result: TaskResult,
    expires_at: DateTime<Utc>,
}

impl StoredEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The map plus the clock. Shared between the store and its sweep loop.
struct ExpiringMap {
    entries: Mutex<HashMap<TaskId, StoredEntry>>,
    clock: Arc<dyn Clock>,
}

impl ExpiringMap {
    // No await happens while this is held, so a std mutex is enough.
    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, StoredEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remove `task_id` if it has expired. Returns the live entry, if any.
    fn live(&self, task_id: TaskId) -> Option<StoredEntry> {
        let now = self.clock.now();
        let mut entries = self.lock();
        match entries.get(&task_id) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(&task_id);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

#[async_trait]
impl Sweep for ExpiringMap {
    async fn sweep(&self) -> Result<usize, CascadeError> {
        Ok(self.purge_expired())
    }
}

pub struct InMemoryResultStore {
    map: Arc<ExpiringMap>,
    default_ttl: Duration,
    sweeper: Mutex<Option<SweepLoop>>,
}

impl InMemoryResultStore {
    pub fn new(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            map: Arc::new(ExpiringMap {
                entries: Mutex::new(HashMap::new()),
                clock,
            }),
            default_ttl,
            sweeper: Mutex::new(None),
        }
    }

    /// Start the periodic sweep. A second call while one is running is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_sweeper(&self, interval: Duration) {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if sweeper.is_none() {
            let target: Arc<dyn Sweep> = self.map.clone();
            *sweeper = Some(SweepLoop::spawn("result-store", target, interval));
        }
    }

    /// Drop every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.map.purge_expired()
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn store(
        &self,
        task_id: TaskId,
        result: &TaskResult,
        ttl: Option<Duration>,
    ) -> Result<(), CascadeError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = add_duration(self.map.clock.now(), ttl);
        self.map.lock().insert(
            task_id,
            StoredEntry {
                result: result.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<TaskResult>, CascadeError> {
        Ok(self.map.live(task_id).map(|entry| entry.result))
    }

    async fn delete(&self, task_id: TaskId) -> Result<bool, CascadeError> {
        let now = self.map.clock.now();
        let removed = self.map.lock().remove(&task_id);
        Ok(removed.is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn exists(&self, task_id: TaskId) -> Result<bool, CascadeError> {
        Ok(self.map.live(task_id).is_some())
    }

    async fn close(&self) {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown_and_join().await;
        }
    }
}
