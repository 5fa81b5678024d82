//! SentenceSegmenter - 組み込みの文単位セグメンタ
//!
//! Splits after runs of `.`, `?`, `!` that are followed by whitespace or
//! the end of input. Only engages when there are at least two terminators.

use async_trait::async_trait;

use crate::domain::CascadeError;
use crate::ports::Segmenter;

pub const KIND: &str = "sentence";

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '?' | '!')
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceSegmenter;

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self
    }

    pub fn split(content: &str) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = content.chars().peekable();

        while let Some(c) = chars.next() {
            current.push(c);
            if !is_terminator(c) {
                continue;
            }
            let boundary = match chars.peek() {
                None => true,
                Some(next) => next.is_whitespace(),
            };
            if boundary {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    segments.push(trimmed.to_string());
                }
                current.clear();
            }
        }

        let rest = current.trim();
        if !rest.is_empty() {
            segments.push(rest.to_string());
        }
        segments
    }
}

#[async_trait]
impl Segmenter for SentenceSegmenter {
    async fn check_condition(&self, content: &str) -> Result<bool, CascadeError> {
        let terminators = content.chars().filter(|c| is_terminator(*c)).count();
        Ok(content.chars().count() > 5 && terminators >= 2)
    }

    async fn create_segments(&self, content: &str) -> Result<Vec<String>, CascadeError> {
        Ok(Self::split(content))
    }
}
