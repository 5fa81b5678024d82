//! Config - TOML 設定と環境変数による上書き
//!
//! Loaded once at startup, then treated as read-only. Every field has a
//! default, so an empty file is a valid in-memory setup with no plugins.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::CascadeError;
use crate::impls::{inmem_results, redis_queue, redis_results};
use crate::pipeline::DEFAULT_CONFIDENCE_THRESHOLD;

pub const ENV_DEFAULT_CONFIDENCE_THRESHOLD: &str = "CASCADE_DEFAULT_CONFIDENCE_THRESHOLD";
pub const ENV_ENABLED_STAGES: &str = "CASCADE_ENABLED_STAGES";
pub const ENV_ENABLED_SEGMENTERS: &str = "CASCADE_ENABLED_SEGMENTERS";
pub const ENV_REDIS_URL: &str = "CASCADE_REDIS_URL";
pub const ENV_CALLBACK_API_KEY: &str = "CASCADE_CALLBACK_API_KEY";

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

fn default_redis_url() -> String {
    DEFAULT_REDIS_URL.to_string()
}

fn default_list_name() -> String {
    redis_queue::DEFAULT_LIST_NAME.to_string()
}

fn default_poll_timeout_secs() -> u64 {
    1
}

fn default_ttl_secs() -> u64 {
    inmem_results::DEFAULT_RESULT_TTL.as_secs()
}

fn default_sweep_interval_secs() -> u64 {
    inmem_results::DEFAULT_SWEEP_INTERVAL.as_secs()
}

fn default_key_prefix() -> String {
    redis_results::DEFAULT_KEY_PREFIX.to_string()
}

fn default_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_callback_timeout_secs() -> u64 {
    10
}

fn default_callback_connect_timeout_secs() -> u64 {
    5
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    pub queue: QueueConfig,
    pub result_store: ResultStoreConfig,
    pub classification: ClassificationConfig,
    pub stages: Vec<StageConfig>,
    pub segmenters: Vec<SegmenterConfig>,
    pub callback: CallbackConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum QueueConfig {
    #[default]
    Memory,
    Redis {
        #[serde(default = "default_redis_url")]
        url: String,
        #[serde(default = "default_list_name")]
        list_name: String,
        #[serde(default = "default_poll_timeout_secs")]
        poll_timeout_secs: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultStoreConfig {
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    #[serde(flatten)]
    pub backend: ResultBackendConfig,
}

impl Default for ResultStoreConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            backend: ResultBackendConfig::default(),
        }
    }
}

impl ResultStoreConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ResultBackendConfig {
    Memory {
        #[serde(default = "default_sweep_interval_secs")]
        sweep_interval_secs: u64,
    },
    Redis {
        #[serde(default = "default_redis_url")]
        url: String,
        #[serde(default = "default_key_prefix")]
        key_prefix: String,
    },
}

impl Default for ResultBackendConfig {
    fn default() -> Self {
        Self::Memory {
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub default_confidence_threshold: f64,
    /// Empty means every declared stage.
    pub enabled_stages: Vec<String>,
    /// Empty means every declared segmenter.
    pub enabled_segmenters: Vec<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            default_confidence_threshold: default_threshold(),
            enabled_stages: Vec::new(),
            enabled_segmenters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub alias: String,
    pub kind: String,
    #[serde(default)]
    pub cost: u32,
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
    #[serde(default)]
    pub options: toml::Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    pub alias: String,
    pub kind: String,
    #[serde(default)]
    pub options: toml::Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            timeout_secs: default_callback_timeout_secs(),
            connect_timeout_secs: default_callback_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl CascadeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, CascadeError> {
        toml::from_str(text).map_err(|e| CascadeError::Config(e.to_string()))
    }

    /// Read `path`, apply process environment overrides, validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CascadeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CascadeError::Config(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CASCADE_*` overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), CascadeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_DEFAULT_CONFIDENCE_THRESHOLD) {
            self.classification.default_confidence_threshold =
                raw.trim().parse::<f64>().map_err(|e| {
                    CascadeError::Config(format!("{ENV_DEFAULT_CONFIDENCE_THRESHOLD}={raw}: {e}"))
                })?;
        }
        if let Some(raw) = lookup(ENV_ENABLED_STAGES) {
            self.classification.enabled_stages = comma_list(&raw);
        }
        if let Some(raw) = lookup(ENV_ENABLED_SEGMENTERS) {
            self.classification.enabled_segmenters = comma_list(&raw);
        }
        if let Some(redis_url) = lookup(ENV_REDIS_URL) {
            if let QueueConfig::Redis { url, .. } = &mut self.queue {
                *url = redis_url.clone();
            }
            if let ResultBackendConfig::Redis { url, .. } = &mut self.result_store.backend {
                *url = redis_url;
            }
        }
        if let Some(key) = lookup(ENV_CALLBACK_API_KEY) {
            self.callback.api_key = Some(key).filter(|k| !k.is_empty());
        }
        Ok(())
    }

    /// Checks that do not need the plugin registry.
    pub fn validate(&self) -> Result<(), CascadeError> {
        check_threshold(
            "classification.default_confidence_threshold",
            self.classification.default_confidence_threshold,
        )?;
        for stage in &self.stages {
            if let Some(t) = stage.confidence_threshold {
                check_threshold(&format!("stage '{}' confidence_threshold", stage.alias), t)?;
            }
        }
        if self.result_store.default_ttl_secs == 0 {
            return Err(CascadeError::Config(
                "result_store.default_ttl_secs must be positive".into(),
            ));
        }
        if let ResultBackendConfig::Memory {
            sweep_interval_secs: 0,
        } = self.result_store.backend
        {
            return Err(CascadeError::Config(
                "result_store.sweep_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn check_threshold(what: &str, value: f64) -> Result<(), CascadeError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CascadeError::Config(format!(
            "{what} must be within [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FULL: &str = r#"
[queue]
backend = "redis"
url = "redis://queue-host:6379"

[result_store]
backend = "redis"
default_ttl_secs = 600

[classification]
default_confidence_threshold = 0.7
enabled_stages = ["rules"]

[[stages]]
alias = "rules"
kind = "keyword"
cost = 1
confidence_threshold = 0.9
[stages.options]
rules = [{ label = "greeting", keywords = ["hello"] }]

[[stages]]
alias = "llm"
kind = "remote"
cost = 5

[[segmenters]]
alias = "sentences"
kind = "sentence"

[callback]
api_key = "secret"
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = CascadeConfig::from_toml_str("").unwrap();
        assert_eq!(config, CascadeConfig::default());
        assert_eq!(config.queue, QueueConfig::Memory);
        assert_eq!(config.result_store.default_ttl_secs, 3600);
        assert_eq!(
            config.result_store.backend,
            ResultBackendConfig::Memory {
                sweep_interval_secs: 60
            }
        );
        assert_eq!(config.classification.default_confidence_threshold, 0.80);
        assert_eq!(config.callback.timeout_secs, 10);
        assert_eq!(config.callback.connect_timeout_secs, 5);
        assert_eq!(config.logging.filter, "info");
        config.validate().unwrap();
    }

    #[test]
    fn parses_every_section() {
        let config = CascadeConfig::from_toml_str(FULL).unwrap();

        assert_eq!(
            config.queue,
            QueueConfig::Redis {
                url: "redis://queue-host:6379".into(),
                list_name: "cascade-tasks".into(),
                poll_timeout_secs: 1,
            }
        );
        assert_eq!(config.result_store.default_ttl(), Duration::from_secs(600));
        assert_eq!(
            config.result_store.backend,
            ResultBackendConfig::Redis {
                url: DEFAULT_REDIS_URL.into(),
                key_prefix: "cascade-result:".into(),
            }
        );
        assert_eq!(config.classification.enabled_stages, vec!["rules"]);
        assert_eq!(config.stages.len(), 2);
        assert_eq!(config.stages[0].confidence_threshold, Some(0.9));
        assert!(config.stages[0].options.contains_key("rules"));
        assert_eq!(config.stages[1].cost, 5);
        assert_eq!(config.stages[1].confidence_threshold, None);
        assert_eq!(config.segmenters[0].kind, "sentence");
        assert_eq!(config.callback.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = CascadeConfig::from_toml_str(FULL).unwrap();
        config
            .apply_env(env(&[
                (ENV_DEFAULT_CONFIDENCE_THRESHOLD, "0.65"),
                (ENV_ENABLED_STAGES, "llm, rules,"),
                (ENV_ENABLED_SEGMENTERS, ""),
                (ENV_REDIS_URL, "redis://other:6380"),
                (ENV_CALLBACK_API_KEY, "rotated"),
            ]))
            .unwrap();

        assert_eq!(config.classification.default_confidence_threshold, 0.65);
        assert_eq!(config.classification.enabled_stages, vec!["llm", "rules"]);
        assert!(config.classification.enabled_segmenters.is_empty());
        assert!(matches!(&config.queue, QueueConfig::Redis { url, .. } if url == "redis://other:6380"));
        assert!(matches!(
            &config.result_store.backend,
            ResultBackendConfig::Redis { url, .. } if url == "redis://other:6380"
        ));
        assert_eq!(config.callback.api_key.as_deref(), Some("rotated"));
    }

    #[test]
    fn malformed_threshold_override_is_a_config_error() {
        let mut config = CascadeConfig::default();
        let err = config
            .apply_env(env(&[(ENV_DEFAULT_CONFIDENCE_THRESHOLD, "high")]))
            .unwrap_err();
        assert!(matches!(err, CascadeError::Config(_)));
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        let mut config = CascadeConfig::from_toml_str(FULL).unwrap();
        config.stages[0].confidence_threshold = Some(1.5);
        assert!(config.validate().is_err());

        let mut config = CascadeConfig::default();
        config.classification.default_confidence_threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_fails_to_parse() {
        let err = CascadeConfig::from_toml_str("[queue]\nbackend = \"kafka\"\n").unwrap_err();
        assert!(matches!(err, CascadeError::Config(_)));
    }
}
