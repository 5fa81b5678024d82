//! End-to-end: submit → queue → worker → orchestrator → result store (→ callback).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cascade_core::domain::{CascadeError, PriorityOrder, StageResult, Task, TaskId, TaskStatus};
use cascade_core::ports::{ManualClock, Stage};
use cascade_core::{App, AppBuilder, CascadeConfig};
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POLL: Duration = Duration::from_millis(5);
const WAIT: Duration = Duration::from_secs(5);

type Calls = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Deserialize)]
struct ScriptedOptions {
    name: String,
    #[serde(default = "one")]
    confidence: f64,
    #[serde(default)]
    fail_on: Option<String>,
}

fn one() -> f64 {
    1.0
}

/// Configurable test stage; records "<name>:<segment>" for every classify.
struct Scripted {
    options: ScriptedOptions,
    calls: Calls,
}

#[async_trait]
impl Stage for Scripted {
    async fn classify(
        &self,
        _context: &[String],
        segment: &str,
        _is_partial: bool,
    ) -> Result<StageResult, CascadeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{segment}", self.options.name));
        if let Some(marker) = &self.options.fail_on {
            if segment.contains(marker.as_str()) {
                return Err(CascadeError::plugin(format!("cannot handle '{segment}'")));
            }
        }
        Ok(StageResult::new(self.options.confidence).with("label", self.options.name.clone()))
    }
}

fn builder(toml: &str, calls: &Calls) -> AppBuilder {
    let calls = calls.clone();
    AppBuilder::new(CascadeConfig::from_toml_str(toml).unwrap())
        .register_stage("scripted", move |options| {
            let options: ScriptedOptions = toml::Value::Table(options.clone())
                .try_into()
                .map_err(|e| CascadeError::Config(format!("scripted options: {e}")))?;
            Ok(Arc::new(Scripted {
                options,
                calls: calls.clone(),
            }) as Arc<dyn Stage>)
        })
        .unwrap()
}

async fn started(toml: &str, calls: &Calls) -> App {
    let mut app = builder(toml, calls).build().await.unwrap();
    app.start();
    app
}

async fn run_to_completion(app: &App, task: Task) -> cascade_core::TaskResult {
    let id = app.submit(task).await.unwrap();
    app.wait_for_result(id, POLL, WAIT)
        .await
        .unwrap()
        .expect("task should reach a terminal state")
}

fn calls_of(calls: &Calls) -> Vec<String> {
    calls.lock().unwrap().clone()
}

const ALWAYS_MATCHES: &str = r#"
[[stages]]
alias = "always"
kind = "scripted"
cost = 0
confidence_threshold = 0.5
options = { name = "always", confidence = 1.0 }
"#;

#[tokio::test]
async fn single_segment_without_segmenters() {
    let calls = Calls::default();
    let app = started(ALWAYS_MATCHES, &calls).await;

    let result = run_to_completion(&app, Task::classify(TaskId::new_v4(), "Hello. How are you?")).await;

    assert_eq!(result.status, TaskStatus::Completed);
    assert!(result.error.is_none());
    let outcomes = result.results.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].segment, "Hello. How are you?");
    assert_eq!(outcomes[0].eval.confidence, 1.0);
    assert_eq!(outcomes[0].eval.get("label").unwrap(), "always");
    assert_eq!(calls_of(&calls), vec!["always:Hello. How are you?"]);

    app.shutdown().await;
}

#[tokio::test]
async fn zero_budget_invokes_no_stage() {
    let calls = Calls::default();
    let toml = r#"
[[segmenters]]
alias = "sentences"
kind = "sentence"

[[stages]]
alias = "paid"
kind = "scripted"
cost = 1
options = { name = "paid" }
"#;
    let app = started(toml, &calls).await;

    let task = Task::classify(TaskId::new_v4(), "First sentence. Second sentence.").with_budget(0);
    let result = run_to_completion(&app, task).await;

    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.results, Some(vec![]));
    assert!(calls_of(&calls).is_empty());

    app.shutdown().await;
}

#[tokio::test]
async fn error_on_second_segment_fails_the_whole_task() {
    let calls = Calls::default();
    let toml = r#"
[[segmenters]]
alias = "sentences"
kind = "sentence"

[[stages]]
alias = "fragile"
kind = "scripted"
options = { name = "fragile", fail_on = "explode" }
"#;
    let app = started(toml, &calls).await;

    let task = Task::classify(TaskId::new_v4(), "This one is fine. This one will explode.");
    let id = task.task_id;
    let result = run_to_completion(&app, task).await;

    assert_eq!(result.status, TaskStatus::Failed);
    assert!(result.results.is_none());
    let error = result.error.as_deref().unwrap();
    assert!(error.contains("fragile"), "{error}");
    assert!(error.contains("This one will explode."), "{error}");
    assert_eq!(calls_of(&calls).len(), 2);

    let stored = app.result(id).await.unwrap().unwrap();
    assert_eq!(stored, result);

    app.shutdown().await;
}

#[tokio::test]
async fn callback_failure_leaves_stored_result_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("X-Api-Key", "shared-secret"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let calls = Calls::default();
    let toml = format!(
        "[callback]\napi_key = \"shared-secret\"\ntimeout_secs = 2\nconnect_timeout_secs = 1\n{ALWAYS_MATCHES}"
    );
    let app = started(&toml, &calls).await;

    let task = Task::classify(TaskId::new_v4(), "Please call me back")
        .with_callback(format!("{}/hook", server.uri()));
    let id = task.task_id;
    let result = run_to_completion(&app, task).await;
    // shutdown lets the in-flight task (and its callback) finish
    app.shutdown().await;

    assert_eq!(result.status, TaskStatus::Completed);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["task_id"], id.to_string());
    assert_eq!(body["status"], "completed");
    assert_eq!(body["results"][0]["segment"], "Please call me back");
}

#[tokio::test]
async fn descending_order_reverses_stages_but_not_segments() {
    let calls = Calls::default();
    let toml = r#"
[[segmenters]]
alias = "sentences"
kind = "sentence"

[[stages]]
alias = "cheap"
kind = "scripted"
confidence_threshold = 0.5
options = { name = "cheap", confidence = 0.1 }

[[stages]]
alias = "expensive"
kind = "scripted"
confidence_threshold = 0.5
options = { name = "expensive", confidence = 0.1 }
"#;
    let app = started(toml, &calls).await;

    let task = Task::classify(TaskId::new_v4(), "Alpha one. Beta two.")
        .with_priority_order(PriorityOrder::Descending);
    let result = run_to_completion(&app, task).await;

    assert_eq!(result.status, TaskStatus::Completed);
    assert_eq!(result.results, Some(vec![]));
    assert_eq!(
        calls_of(&calls),
        vec![
            "expensive:Alpha one.",
            "cheap:Alpha one.",
            "expensive:Beta two.",
            "cheap:Beta two.",
        ]
    );

    app.shutdown().await;
}

#[tokio::test]
async fn budget_is_shared_across_segments() {
    let calls = Calls::default();
    let toml = r#"
[[segmenters]]
alias = "sentences"
kind = "sentence"

[[stages]]
alias = "metered"
kind = "scripted"
cost = 2
options = { name = "metered" }
"#;
    let app = started(toml, &calls).await;

    let task = Task::classify(TaskId::new_v4(), "One sentence. Two sentence. Three sentence.")
        .with_budget(5);
    let result = run_to_completion(&app, task).await;

    let segments: Vec<_> = result
        .results
        .unwrap()
        .into_iter()
        .map(|o| o.segment)
        .collect();
    assert_eq!(segments, vec!["One sentence.", "Two sentence."]);
    assert_eq!(calls_of(&calls).len(), 2);

    app.shutdown().await;
}

#[tokio::test]
async fn stored_result_expires_without_a_sweep() {
    let calls = Calls::default();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
    ));
    let toml = format!(
        "[result_store]\nbackend = \"memory\"\ndefault_ttl_secs = 60\nsweep_interval_secs = 3600\n{ALWAYS_MATCHES}"
    );
    let mut app = builder(&toml, &calls)
        .with_clock(clock.clone())
        .build()
        .await
        .unwrap();
    app.start();

    let result = run_to_completion(&app, Task::classify(TaskId::new_v4(), "short lived")).await;
    let id = result.task_id;

    clock.advance(Duration::from_secs(59));
    assert!(app.result(id).await.unwrap().is_some());

    clock.advance(Duration::from_secs(1));
    assert!(app.result(id).await.unwrap().is_none());
    assert!(!app.results().exists(id).await.unwrap());

    app.shutdown().await;
}

#[tokio::test]
async fn worker_keeps_going_after_a_failed_task() {
    let calls = Calls::default();
    let toml = r#"
[[stages]]
alias = "fragile"
kind = "scripted"
options = { name = "fragile", fail_on = "bad" }
"#;
    let app = started(toml, &calls).await;

    let bad = run_to_completion(&app, Task::classify(TaskId::new_v4(), "bad input")).await;
    let good = run_to_completion(&app, Task::classify(TaskId::new_v4(), "good input")).await;

    assert_eq!(bad.status, TaskStatus::Failed);
    assert_eq!(good.status, TaskStatus::Completed);
    assert!(app.is_running());

    app.shutdown().await;
}
