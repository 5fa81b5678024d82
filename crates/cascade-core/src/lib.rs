//! cascade-core
//!
//! Cost-aware, confidence-gated text classification pipeline.
//!
//! Tasks are submitted to a [`TaskQueue`](ports::TaskQueue), picked up one at a
//! time by a [`WorkerLoop`](app::WorkerLoop), segmented, and pushed through an
//! ordered chain of pluggable stages until one is confident enough or the
//! task's budget runs out. Terminal results land in an expiring
//! [`ResultStore`](ports::ResultStore) and are optionally POSTed to a callback.
//!
//! # モジュール構成
//! - **domain**: Task, TaskResult, TaskId, errors
//! - **ports**: TaskQueue, ResultStore, Stage, Segmenter, CallbackNotifier, Clock
//! - **impls**: in-memory / Redis backends, HTTP callback, built-in plugins
//! - **pipeline**: segmentation, stage chain, orchestrator
//! - **app**: builder, plugin registry, worker and sweep loops
//! - **config**: TOML configuration with environment overrides

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod pipeline;
pub mod ports;

pub use crate::app::{App, AppBuilder, BuildError, PluginRegistry};
pub use crate::config::CascadeConfig;
pub use crate::domain::{CascadeError, Task, TaskId, TaskResult, TaskStatus};
