//! KeywordStage - 組み込みのキーワード一致ステージ
//!
//! A cheap, deterministic stage meant to sit at the front of the chain:
//! case-insensitive whole-word match against per-label keyword lists.
//! The first rule (in declared order) with a hit wins.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{CascadeError, StageResult};
use crate::ports::Stage;

pub const KIND: &str = "keyword";

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordRule {
    pub label: String,
    pub keywords: Vec<String>,
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeywordStageOptions {
    #[serde(default)]
    pub rules: Vec<KeywordRule>,

    /// Confidence reported on a hit.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

pub struct KeywordStage {
    /// (label, normalized keyword) in declared order
    rules: Vec<(String, Vec<String>)>,
    confidence: f64,
}

/// Lowercase words joined by single spaces, padded so that
/// `" kw "` containment is a whole-word test.
fn normalize(text: &str) -> String {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

impl KeywordStage {
    pub fn new(options: KeywordStageOptions) -> Self {
        let rules = options
            .rules
            .into_iter()
            .map(|rule| {
                let keywords = rule
                    .keywords
                    .iter()
                    .map(|kw| normalize(kw))
                    .filter(|kw| !kw.trim().is_empty())
                    .collect();
                (rule.label, keywords)
            })
            .collect();
        Self {
            rules,
            confidence: options.confidence,
        }
    }

    pub fn from_options(options: &toml::Table) -> Result<Self, CascadeError> {
        let options: KeywordStageOptions = toml::Value::Table(options.clone())
            .try_into()
            .map_err(|e| CascadeError::Config(format!("keyword stage options: {e}")))?;
        Ok(Self::new(options))
    }
}

#[async_trait]
impl Stage for KeywordStage {
    async fn classify(
        &self,
        _context: &[String],
        segment: &str,
        _is_partial: bool,
    ) -> Result<StageResult, CascadeError> {
        let haystack = normalize(segment);
        for (label, keywords) in &self.rules {
            if let Some(kw) = keywords.iter().find(|kw| haystack.contains(kw.as_str())) {
                return Ok(StageResult::new(self.confidence)
                    .with("label", label.clone())
                    .with("matched", kw.trim().to_string()));
            }
        }
        Ok(StageResult::new(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage() -> KeywordStage {
        let options: toml::Table = toml::from_str(
            r#"
            confidence = 0.9
            [[rules]]
            label = "greeting"
            keywords = ["hello", "good morning"]
            [[rules]]
            label = "farewell"
            keywords = ["bye"]
            "#,
        )
        .unwrap();
        KeywordStage::from_options(&options).unwrap()
    }

    #[tokio::test]
    async fn matches_whole_words_case_insensitively() {
        let result = stage().classify(&[], "Well, HELLO there!", false).await.unwrap();
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.get("label").unwrap(), "greeting");
        assert_eq!(result.get("matched").unwrap(), "hello");
    }

    #[tokio::test]
    async fn matches_multi_word_keywords() {
        let result = stage().classify(&[], "good   morning, all", false).await.unwrap();
        assert_eq!(result.get("label").unwrap(), "greeting");
    }

    #[tokio::test]
    async fn substring_is_not_a_match() {
        let result = stage().classify(&[], "byebye othello", false).await.unwrap();
        assert_eq!(result.confidence, 0.0);
        assert!(result.get("label").is_none());
    }

    #[tokio::test]
    async fn first_declared_rule_wins() {
        let result = stage().classify(&[], "hello and bye", false).await.unwrap();
        assert_eq!(result.get("label").unwrap(), "greeting");
    }

    #[test]
    fn invalid_options_are_a_config_error() {
        let options: toml::Table = toml::from_str("rules = 3").unwrap();
        assert!(matches!(
            KeywordStage::from_options(&options),
            Err(CascadeError::Config(_))
        ));
    }
}
