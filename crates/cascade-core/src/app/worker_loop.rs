//! WorkerLoop - タスク実行ループ
//!
//! # フロー
//! 1. TaskQueue::dequeue() で次のタスクを待つ（shutdown と競合させる）
//! 2. TaskHandler::handle() を実行（1 件ずつ、直列）
//! 3. handler の失敗・panic はログに残してループを継続

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ports::{TaskHandler, TaskQueue};

/// Pause after a failed dequeue (e.g. Redis unreachable) before trying again.
const DEQUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Worker loop handle.
/// - `close()` でループを止め、終了を待つ
/// - 実行中のタスクは最後まで走らせる（新しいタスクは取らない）
pub struct WorkerLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerLoop {
    /// Start consuming `queue` with `handler`. One task at a time.
    pub fn spawn(queue: Arc<dyn TaskQueue>, handler: Arc<dyn TaskHandler>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(worker_loop(queue, handler, shutdown_rx));
        Self { shutdown_tx, join }
    }

    /// Whether the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Signal shutdown, cancel a pending dequeue, and wait for the loop to stop.
    pub async fn close(self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            tracing::error!("worker loop terminated abnormally: {e}");
        }
    }
}

async fn worker_loop(
    queue: Arc<dyn TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::info!("worker loop started");
    loop {
        // shutdown が来ていたら抜ける
        if *shutdown_rx.borrow() {
            break;
        }

        // dequeue は「待つ」ので select で shutdown と競合させる
        let dequeued = tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender dropped without close(): nobody can stop us any more, so stop now
                if changed.is_err() {
                    break;
                }
                continue;
            }
            dequeued = queue.dequeue() => dequeued,
        };

        let task = match dequeued {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(error_kind = ?e.kind(), "dequeue failed: {e}");
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = tokio::time::sleep(DEQUEUE_ERROR_BACKOFF) => {}
                }
                continue;
            }
        };

        let task_id = task.task_id;
        // 別タスクで実行して panic をループから隔離する
        let run = tokio::spawn({
            let handler = Arc::clone(&handler);
            async move { handler.handle(task).await }
        });

        match run.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(%task_id, error_kind = ?e.kind(), "task handler failed: {e}");
            }
            Err(e) => {
                tracing::error!(%task_id, "task handler panicked: {e}");
            }
        }
    }
    tracing::info!("worker loop stopped");
}
