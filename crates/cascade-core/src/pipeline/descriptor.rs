//! Descriptors: a configured plugin instance plus its per-declaration policy.
//!
//! Resolved once at startup and never mutated afterwards.

use std::fmt;
use std::sync::Arc;

use crate::ports::{Segmenter, Stage};

#[derive(Clone)]
pub struct StageDescriptor {
    pub alias: String,
    pub cost: u32,
    /// `None` falls back to the process-wide default threshold.
    pub confidence_threshold: Option<f64>,
    pub stage: Arc<dyn Stage>,
}

impl StageDescriptor {
    pub fn new(alias: impl Into<String>, cost: u32, stage: Arc<dyn Stage>) -> Self {
        Self {
            alias: alias.into(),
            cost,
            confidence_threshold: None,
            stage,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn threshold(&self, default: f64) -> f64 {
        self.confidence_threshold.unwrap_or(default)
    }
}

impl fmt::Debug for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDescriptor")
            .field("alias", &self.alias)
            .field("cost", &self.cost)
            .field("confidence_threshold", &self.confidence_threshold)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct SegmenterDescriptor {
    pub alias: String,
    pub segmenter: Arc<dyn Segmenter>,
}

impl SegmenterDescriptor {
    pub fn new(alias: impl Into<String>, segmenter: Arc<dyn Segmenter>) -> Self {
        Self {
            alias: alias.into(),
            segmenter,
        }
    }
}

impl fmt::Debug for SegmenterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmenterDescriptor")
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}
