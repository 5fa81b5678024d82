//! Segmenter port - 入力テキストを独立した分類単位に分割する

use async_trait::async_trait;

use crate::domain::CascadeError;

#[async_trait]
pub trait Segmenter: Send + Sync {
    async fn on_startup(&self) -> Result<(), CascadeError> {
        Ok(())
    }

    /// Cheap precondition deciding whether segmentation is worth paying for.
    /// Default: content is longer than 5 characters.
    async fn check_condition(&self, content: &str) -> Result<bool, CascadeError> {
        Ok(content.chars().count() > 5)
    }

    async fn create_segments(&self, content: &str) -> Result<Vec<String>, CascadeError>;

    /// Default: trimmed segment is longer than 3 characters.
    async fn validate_segment(&self, segment: &str) -> Result<bool, CascadeError> {
        Ok(segment.trim().chars().count() > 3)
    }
}
