//! HttpCallbackNotifier - 完了したタスク結果を callback_url に POST する
//!
//! One attempt per task, bounded by connect and overall timeouts. Every
//! failure mode (connect error, timeout, non-2xx) is logged and swallowed.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{CascadeError, TaskResult};
use crate::ports::CallbackNotifier;

pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CALLBACK_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpCallbackNotifier {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl HttpCallbackNotifier {
    pub fn new(
        timeout: Duration,
        connect_timeout: Duration,
        api_key: Option<String>,
    ) -> Result<Self, CascadeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| CascadeError::Config(format!("callback http client: {e}")))?;
        Ok(Self { client, api_key })
    }

    async fn post(&self, address: &str, result: &TaskResult) -> Result<(), reqwest::Error> {
        let mut request = self.client.post(address).json(result);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl CallbackNotifier for HttpCallbackNotifier {
    async fn notify(&self, address: &str, result: &TaskResult) {
        match self.post(address, result).await {
            Ok(()) => {
                tracing::debug!(task_id = %result.task_id, callback_url = address, "callback delivered");
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(task_id = %result.task_id, callback_url = address, "callback timed out: {e}");
            }
            Err(e) => match e.status() {
                Some(status) => tracing::warn!(
                    task_id = %result.task_id,
                    callback_url = address,
                    status = status.as_u16(),
                    "callback endpoint returned an error status"
                ),
                None => tracing::warn!(
                    task_id = %result.task_id,
                    callback_url = address,
                    "callback request failed: {e}"
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskId};
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn finished(task_id: TaskId) -> TaskResult {
        let task = Task::classify(task_id, "hello");
        let mut result = TaskResult::processing(&task, Utc::now());
        result.mark_completed(vec![]);
        result
    }

    fn notifier(api_key: Option<&str>) -> HttpCallbackNotifier {
        HttpCallbackNotifier::new(
            Duration::from_millis(500),
            Duration::from_millis(200),
            api_key.map(str::to_string),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_result_json_with_api_key() {
        let server = MockServer::start().await;
        let id = TaskId::new_v4();

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header(API_KEY_HEADER, "secret"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "task_id": id.to_string(),
                "status": "completed",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        notifier(Some("secret"))
            .notify(&format!("{}/hook", server.uri()), &finished(id))
            .await;
    }

    #[tokio::test]
    async fn server_error_is_swallowed_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        notifier(None)
            .notify(&server.uri(), &finished(TaskId::new_v4()))
            .await;
    }

    #[tokio::test]
    async fn slow_endpoint_is_bounded_by_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        notifier(None)
            .notify(&server.uri(), &finished(TaskId::new_v4()))
            .await;
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn unreachable_or_invalid_address_is_swallowed() {
        let n = notifier(None);
        n.notify("http://127.0.0.1:9/unreachable", &finished(TaskId::new_v4()))
            .await;
        n.notify("not a url", &finished(TaskId::new_v4())).await;
    }
}
