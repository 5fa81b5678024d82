//! AppBuilder - 設定からアプリケーションを構築する
//!
//! # Fail-fast 設計
//! build() の時点で以下を検証し、問題があれば BuildError を返す:
//! - alias の重複、whitelist に存在しない alias
//! - 未登録の plugin kind
//! - [0, 1] の範囲外の閾値
//! - plugin の on_startup 失敗、バックエンドへの接続失敗
//!
//! Nothing is spawned by `build()`. `App::start()` starts the worker loop
//! and, for the memory result store, the sweep loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CascadeConfig, QueueConfig, ResultBackendConfig};
use crate::domain::{CascadeError, Task, TaskId, TaskResult};
use crate::impls::{
    HttpCallbackNotifier, InMemoryResultStore, InMemoryTaskQueue, RedisResultStore, RedisTaskQueue,
};
use crate::pipeline::{Orchestrator, Pipeline, SegmenterDescriptor, StageChain, StageDescriptor};
use crate::ports::{CallbackNotifier, Clock, ResultStore, Segmenter, Stage, SystemClock, TaskQueue};

use super::registry::{PluginRegistry, RegistryError};
use super::worker_loop::WorkerLoop;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("'{0}' is enabled but not declared")]
    UnknownAlias(String),

    #[error("alias '{0}' is declared more than once")]
    DuplicateAlias(String),

    #[error(transparent)]
    Cascade(#[from] CascadeError),
}

pub struct AppBuilder {
    config: CascadeConfig,
    registry: PluginRegistry,
    clock: Arc<dyn Clock>,
    queue: Option<Arc<dyn TaskQueue>>,
    results: Option<Arc<dyn ResultStore>>,
    notifier: Option<Arc<dyn CallbackNotifier>>,
}

impl AppBuilder {
    /// Builder with the built-in plugin kinds registered.
    pub fn new(config: CascadeConfig) -> Self {
        Self {
            config,
            registry: PluginRegistry::with_builtins(),
            clock: Arc::new(SystemClock),
            queue: None,
            results: None,
            notifier: None,
        }
    }

    pub fn register_stage<F>(mut self, kind: &str, factory: F) -> Result<Self, RegistryError>
    where
        F: Fn(&toml::Table) -> Result<Arc<dyn Stage>, CascadeError> + Send + Sync + 'static,
    {
        self.registry.register_stage(kind, factory)?;
        Ok(self)
    }

    pub fn register_segmenter<F>(mut self, kind: &str, factory: F) -> Result<Self, RegistryError>
    where
        F: Fn(&toml::Table) -> Result<Arc<dyn Segmenter>, CascadeError> + Send + Sync + 'static,
    {
        self.registry.register_segmenter(kind, factory)?;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use `queue` instead of the configured queue backend.
    pub fn with_queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Use `results` instead of the configured result store backend.
    pub fn with_result_store(mut self, results: Arc<dyn ResultStore>) -> Self {
        self.results = Some(results);
        self
    }

    /// Use `notifier` instead of the HTTP callback notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn CallbackNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub async fn build(self) -> Result<App, BuildError> {
        let config = self.config;
        // 閾値の範囲などは config 側で検証（BuildError::Cascade(Config) になる）
        config.validate()?;

        let segmenters = resolve_segmenters(&config, &self.registry)?;
        let stages = resolve_stages(&config, &self.registry)?;
        let pipeline = Pipeline::new(
            segmenters,
            StageChain::new(stages, config.classification.default_confidence_threshold),
        );
        pipeline.startup().await?;

        let queue: Arc<dyn TaskQueue> = match self.queue {
            Some(queue) => queue,
            None => build_queue(&config.queue).await?,
        };

        let mut memory_store = None;
        let results: Arc<dyn ResultStore> = match self.results {
            Some(results) => results,
            None => match &config.result_store.backend {
                ResultBackendConfig::Memory {
                    sweep_interval_secs,
                } => {
                    let store = Arc::new(InMemoryResultStore::new(
                        config.result_store.default_ttl(),
                        Arc::clone(&self.clock),
                    ));
                    memory_store = Some((
                        Arc::clone(&store),
                        Duration::from_secs(*sweep_interval_secs),
                    ));
                    store as Arc<dyn ResultStore>
                }
                ResultBackendConfig::Redis { url, key_prefix } => Arc::new(
                    RedisResultStore::connect(
                        url,
                        key_prefix.as_str(),
                        config.result_store.default_ttl(),
                    )
                    .await?,
                ),
            },
        };

        let notifier: Arc<dyn CallbackNotifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(HttpCallbackNotifier::new(
                Duration::from_secs(config.callback.timeout_secs),
                Duration::from_secs(config.callback.connect_timeout_secs),
                config.callback.api_key.clone(),
            )?),
        };

        let orchestrator = Orchestrator::new(Arc::new(pipeline), Arc::clone(&results), self.clock)
            .with_notifier(notifier);

        tracing::info!(
            stages = orchestrator.pipeline().chain().stages().len(),
            segmenters = orchestrator.pipeline().segmenters().len(),
            "app built"
        );

        Ok(App {
            queue,
            results,
            orchestrator: Arc::new(orchestrator),
            memory_store,
            worker: None,
        })
    }
}

/// Declared order, filtered by `enabled` (empty = everything).
fn select_enabled<'a, T>(
    declared: &'a [T],
    alias_of: impl Fn(&T) -> &str,
    enabled: &[String],
) -> Result<Vec<&'a T>, BuildError> {
    let mut seen = HashSet::new();
    for item in declared {
        if !seen.insert(alias_of(item)) {
            return Err(BuildError::DuplicateAlias(alias_of(item).to_string()));
        }
    }
    if let Some(missing) = enabled.iter().find(|a| !seen.contains(a.as_str())) {
        return Err(BuildError::UnknownAlias(missing.clone()));
    }

    Ok(declared
        .iter()
        .filter(|item| enabled.is_empty() || enabled.iter().any(|a| a.as_str() == alias_of(*item)))
        .collect())
}

fn resolve_stages(
    config: &CascadeConfig,
    registry: &PluginRegistry,
) -> Result<Vec<StageDescriptor>, BuildError> {
    let selected = select_enabled(
        &config.stages,
        |s| s.alias.as_str(),
        &config.classification.enabled_stages,
    )?;

    let mut stages = Vec::with_capacity(selected.len());
    for declared in selected {
        let factory = registry.stage_factory(&declared.kind)?;
        let stage = factory(&declared.options)
            .map_err(|e| CascadeError::stage(&declared.alias, e))?;
        let mut descriptor = StageDescriptor::new(declared.alias.clone(), declared.cost, stage);
        if let Some(threshold) = declared.confidence_threshold {
            descriptor = descriptor.with_threshold(threshold);
        }
        stages.push(descriptor);
    }
    Ok(stages)
}

fn resolve_segmenters(
    config: &CascadeConfig,
    registry: &PluginRegistry,
) -> Result<Vec<SegmenterDescriptor>, BuildError> {
    let selected = select_enabled(
        &config.segmenters,
        |s| s.alias.as_str(),
        &config.classification.enabled_segmenters,
    )?;

    let mut segmenters = Vec::with_capacity(selected.len());
    for declared in selected {
        let factory = registry.segmenter_factory(&declared.kind)?;
        let segmenter = factory(&declared.options)
            .map_err(|e| CascadeError::segmentation(&declared.alias, e))?;
        segmenters.push(SegmenterDescriptor::new(declared.alias.clone(), segmenter));
    }
    Ok(segmenters)
}

async fn build_queue(config: &QueueConfig) -> Result<Arc<dyn TaskQueue>, CascadeError> {
    let queue: Arc<dyn TaskQueue> = match config {
        QueueConfig::Memory => Arc::new(InMemoryTaskQueue::new()),
        QueueConfig::Redis {
            url,
            list_name,
            poll_timeout_secs,
        } => Arc::new(
            RedisTaskQueue::connect(
                url,
                list_name.as_str(),
                Duration::from_secs(*poll_timeout_secs),
            )
            .await?,
        ),
    };
    Ok(queue)
}

/// Built application: queue, result store and orchestrator wired together.
pub struct App {
    queue: Arc<dyn TaskQueue>,
    results: Arc<dyn ResultStore>,
    orchestrator: Arc<Orchestrator>,
    /// Set when the result store is the in-memory backend built from config.
    memory_store: Option<(Arc<InMemoryResultStore>, Duration)>,
    worker: Option<WorkerLoop>,
}

impl App {
    pub fn queue(&self) -> Arc<dyn TaskQueue> {
        Arc::clone(&self.queue)
    }

    pub fn results(&self) -> Arc<dyn ResultStore> {
        Arc::clone(&self.results)
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// Spawn the worker loop (and the sweep loop). Calling it twice is a no-op.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }
        if let Some((store, interval)) = &self.memory_store {
            store.start_sweeper(*interval);
        }
        let handler = Arc::clone(&self.orchestrator);
        self.worker = Some(WorkerLoop::spawn(Arc::clone(&self.queue), handler));
        tracing::info!("app started");
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub async fn submit(&self, task: Task) -> Result<TaskId, CascadeError> {
        let task_id = task.task_id;
        self.queue.enqueue(task).await?;
        tracing::debug!(%task_id, "task submitted");
        Ok(task_id)
    }

    /// `Ok(None)` means unknown or expired.
    pub async fn result(&self, task_id: TaskId) -> Result<Option<TaskResult>, CascadeError> {
        self.results.get(task_id).await
    }

    /// Poll the result store until a terminal result shows up or `timeout` passes.
    pub async fn wait_for_result(
        &self,
        task_id: TaskId,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Option<TaskResult>, CascadeError> {
        let poll = async {
            loop {
                match self.results.get(task_id).await? {
                    Some(result) if result.status.is_terminal() => {
                        return Ok::<_, CascadeError>(result);
                    }
                    _ => tokio::time::sleep(poll_interval).await,
                }
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Stop the worker loop, then the result store.
    pub async fn shutdown(mut self) {
        if let Some(worker) = self.worker.take() {
            worker.close().await;
        }
        self.results.close().await;
        tracing::info!("app stopped");
    }
}
