//! CallbackNotifier port - 完了通知
//!
//! Infallible by signature: delivery failures are the notifier's to log and
//! never reach the orchestrator.

use async_trait::async_trait;

use crate::domain::TaskResult;

#[async_trait]
pub trait CallbackNotifier: Send + Sync {
    async fn notify(&self, address: &str, result: &TaskResult);
}
