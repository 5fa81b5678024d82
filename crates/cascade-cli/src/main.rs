//! `cascade` -- CLI for the classification pipeline.
//!
//! - `cascade run` -- start an in-process app, submit tasks, print their results.
//! - `cascade submit` -- enqueue tasks only (for a shared Redis queue).
//! - `cascade worker` -- consume the configured queue until Ctrl-C.
//! - `cascade result` -- read one stored result.
//!
//! Submissions are JSON lines in the task input schema. A missing `task_id`
//! is filled with a fresh UUID.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use cascade_core::config::QueueConfig;
use cascade_core::{App, AppBuilder, CascadeConfig, Task, TaskId};
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncReadExt;

#[derive(Parser)]
#[command(name = "cascade", about = "cost-aware classification pipeline", version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArg {
    /// TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct InputArg {
    /// JSON lines file with one submission per line. Reads stdin when omitted.
    #[arg(short, long)]
    input: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process submissions end to end and print each result as a JSON line.
    Run {
        #[command(flatten)]
        config: ConfigArg,

        #[command(flatten)]
        input: InputArg,

        /// Give up waiting for a single result after this many seconds.
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
    },

    /// Enqueue submissions and print their task ids.
    Submit {
        #[command(flatten)]
        config: ConfigArg,

        #[command(flatten)]
        input: InputArg,
    },

    /// Run the worker loop until interrupted.
    Worker {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Print the stored result for a task.
    Result {
        #[command(flatten)]
        config: ConfigArg,

        task_id: TaskId,
    },
}

fn load_config(arg: &ConfigArg) -> anyhow::Result<CascadeConfig> {
    match &arg.config {
        Some(path) => Ok(CascadeConfig::load(path)?),
        None => {
            let mut config = CascadeConfig::default();
            config.apply_env(|key| std::env::var(key).ok())?;
            config.validate()?;
            Ok(config)
        }
    }
}

fn init_tracing(verbose: bool, config: &CascadeConfig) {
    let default_filter = if verbose {
        "debug".to_string()
    } else {
        config.logging.filter.clone()
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

async fn read_input(arg: &InputArg) -> anyhow::Result<String> {
    match &arg.input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("reading stdin")?;
            Ok(text)
        }
    }
}

fn parse_submissions(text: &str) -> anyhow::Result<Vec<Task>> {
    let mut tasks = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut value: serde_json::Value =
            serde_json::from_str(line).with_context(|| format!("line {}: invalid JSON", n + 1))?;
        if let Some(obj) = value.as_object_mut() {
            obj.entry("task_id")
                .or_insert_with(|| serde_json::json!(TaskId::new_v4()));
        }
        let task: Task = serde_json::from_value(value)
            .with_context(|| format!("line {}: invalid submission", n + 1))?;
        tasks.push(task);
    }
    Ok(tasks)
}

async fn build(config: CascadeConfig) -> anyhow::Result<App> {
    AppBuilder::new(config)
        .build()
        .await
        .context("building the app")
}

async fn run(config: CascadeConfig, input: &InputArg, timeout: Duration) -> anyhow::Result<ExitCode> {
    let tasks = parse_submissions(&read_input(input).await?)?;
    let mut app = build(config).await?;
    app.start();

    let mut ids = Vec::with_capacity(tasks.len());
    for task in tasks {
        ids.push(app.submit(task).await?);
    }

    let mut code = ExitCode::SUCCESS;
    for id in ids {
        match app
            .wait_for_result(id, Duration::from_millis(20), timeout)
            .await?
        {
            Some(result) => println!("{}", serde_json::to_string(&result)?),
            None => {
                tracing::error!(task_id = %id, "timed out waiting for result");
                code = ExitCode::FAILURE;
            }
        }
    }

    app.shutdown().await;
    Ok(code)
}

/// A memory queue lives and dies with this process, so nothing would ever
/// consume what `submit` enqueues.
fn ensure_durable_queue(config: &CascadeConfig) -> anyhow::Result<()> {
    if matches!(config.queue, QueueConfig::Memory) {
        anyhow::bail!(
            "submit needs a shared queue; set [queue] backend = \"redis\" (or use `cascade run`)"
        );
    }
    Ok(())
}

async fn submit(config: CascadeConfig, input: &InputArg) -> anyhow::Result<ExitCode> {
    ensure_durable_queue(&config)?;
    let tasks = parse_submissions(&read_input(input).await?)?;
    let app = build(config).await?;
    for task in tasks {
        let id = app.submit(task).await?;
        println!("{id}");
    }
    app.shutdown().await;
    Ok(ExitCode::SUCCESS)
}

async fn worker(config: CascadeConfig) -> anyhow::Result<ExitCode> {
    let mut app = build(config).await?;
    app.start();
    tracing::info!("worker running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    tracing::info!("shutting down");
    app.shutdown().await;
    Ok(ExitCode::SUCCESS)
}

async fn result(config: CascadeConfig, task_id: TaskId) -> anyhow::Result<ExitCode> {
    let app = build(config).await?;
    let found = app.result(task_id).await?;
    app.shutdown().await;
    match found {
        Some(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("no result for {task_id} (unknown or expired)");
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config_arg = match &cli.command {
        Commands::Run { config, .. }
        | Commands::Submit { config, .. }
        | Commands::Worker { config }
        | Commands::Result { config, .. } => config,
    };
    let config = load_config(config_arg)?;
    init_tracing(cli.verbose, &config);

    match cli.command {
        Commands::Run {
            input,
            timeout_secs,
            ..
        } => run(config, &input, Duration::from_secs(timeout_secs)).await,
        Commands::Submit { input, .. } => submit(config, &input).await,
        Commands::Worker { .. } => worker(config).await,
        Commands::Result { task_id, .. } => result(config, task_id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn submissions_get_an_id_when_missing() {
        let text = r#"
{"job": "classify", "content": "Hello. How are you?"}

{"task_id": "6f1c1b1e-4a55-4a5b-9a51-1b2f7c0f7e11", "job": "classify", "content": "x", "job_budget": 3}
"#;
        let tasks = parse_submissions(text).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].content, "Hello. How are you?");
        assert_eq!(
            tasks[1].task_id.to_string(),
            "6f1c1b1e-4a55-4a5b-9a51-1b2f7c0f7e11"
        );
        assert_eq!(tasks[1].job_budget, 3);
    }

    #[test]
    fn bad_line_reports_its_number() {
        let err = parse_submissions("{\"job\": \"classify\", \"content\": \"ok\"}\n{nope").unwrap_err();
        assert!(err.to_string().starts_with("line 2"));
    }

    #[test]
    fn submit_refuses_the_memory_queue() {
        let memory = CascadeConfig::default();
        let err = ensure_durable_queue(&memory).unwrap_err();
        assert!(err.to_string().contains("redis"), "{err}");

        let redis = CascadeConfig::from_toml_str(
            "[queue]\nbackend = \"redis\"\nurl = \"redis://127.0.0.1:6379\"\n",
        )
        .unwrap();
        assert!(ensure_durable_queue(&redis).is_ok());
    }
}
