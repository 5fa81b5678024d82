//! Errors - エラー型と分類

use thiserror::Error;

/// ErrorKind は運用上の分類（ログのフィールドとして使う）
///
/// - Plugin: a stage or segmenter failed; fails the current task only
/// - Infrastructure: queue / result store / network failure
/// - Configuration: bad config, unknown plugin kind, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Plugin,
    Infrastructure,
    Configuration,
}

#[derive(Debug, Error)]
pub enum CascadeError {
    /// Raised by plugin code itself. Wrapped into `Stage`/`Segmentation`
    /// by the pipeline so the failing alias shows up in the task error.
    #[error("{0}")]
    Plugin(String),

    #[error("stage '{alias}' failed: {message}")]
    Stage { alias: String, message: String },

    #[error("segmenter '{alias}' failed: {message}")]
    Segmentation { alias: String, message: String },

    #[error("classification aborted: {0}")]
    Aborted(String),

    #[error("queue backend error: {0}")]
    Queue(String),

    #[error("result store backend error: {0}")]
    ResultStore(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CascadeError {
    pub fn plugin(message: impl Into<String>) -> Self {
        Self::Plugin(message.into())
    }

    pub fn stage(alias: &str, err: CascadeError) -> Self {
        Self::Stage {
            alias: alias.to_string(),
            message: err.to_string(),
        }
    }

    pub fn segmentation(alias: &str, err: CascadeError) -> Self {
        Self::Segmentation {
            alias: alias.to_string(),
            message: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Plugin(_) | Self::Stage { .. } | Self::Segmentation { .. } | Self::Aborted(_) => {
                ErrorKind::Plugin
            }
            Self::Queue(_) | Self::ResultStore(_) | Self::Serialization(_) => {
                ErrorKind::Infrastructure
            }
            Self::Config(_) => ErrorKind::Configuration,
        }
    }
}
