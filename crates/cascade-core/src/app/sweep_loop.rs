//! SweepLoop - 期限切れ結果のガベージコレクション
//!
//! # フロー
//! 1. 一定間隔で `Sweep::sweep()` を呼ぶ
//! 2. 失敗してもループは止めない（次の tick で再試行）
//! 3. `shutdown_and_join()` で確実に停止

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::CascadeError;

/// Something that can drop its expired entries.
#[async_trait]
pub trait Sweep: Send + Sync {
    /// Returns how many entries were removed.
    async fn sweep(&self) -> Result<usize, CascadeError>;
}

/// Handle to a running sweep loop. Owned by whatever owns the swept data.
pub struct SweepLoop {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweepLoop {
    /// The first sweep runs immediately, then every `interval`.
    pub fn spawn(name: &'static str, target: Arc<dyn Sweep>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                match target.sweep().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(sweep = name, removed, "swept expired entries"),
                    Err(e) => tracing::warn!(sweep = name, "sweep failed: {e}"),
                }
            }
            tracing::debug!(sweep = name, "sweep loop stopped");
        });

        Self { shutdown_tx, join }
    }

    pub async fn shutdown_and_join(self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}
