//! Segmentation - どのセグメンタの分割を採用するか
//!
//! Segmenters are tried in declared order. The first whose precondition
//! holds *and* whose output is non-empty and fully valid wins; later
//! segmenters are not consulted. Otherwise the whole content is one segment,
//! so the result is never empty.

use crate::domain::CascadeError;

use super::descriptor::SegmenterDescriptor;

pub async fn segment_content(
    segmenters: &[SegmenterDescriptor],
    content: &str,
) -> Result<Vec<String>, CascadeError> {
    for descriptor in segmenters {
        let alias = descriptor.alias.as_str();
        let segmenter = &descriptor.segmenter;

        let applies = segmenter
            .check_condition(content)
            .await
            .map_err(|e| CascadeError::segmentation(alias, e))?;
        if !applies {
            tracing::debug!(segmenter = alias, "precondition not met");
            continue;
        }

        let segments = segmenter
            .create_segments(content)
            .await
            .map_err(|e| CascadeError::segmentation(alias, e))?;
        if segments.is_empty() {
            tracing::debug!(segmenter = alias, "produced no segments");
            continue;
        }

        let mut all_valid = true;
        for segment in &segments {
            let valid = segmenter
                .validate_segment(segment)
                .await
                .map_err(|e| CascadeError::segmentation(alias, e))?;
            if !valid {
                all_valid = false;
                break;
            }
        }
        if all_valid {
            tracing::debug!(segmenter = alias, count = segments.len(), "using segments");
            return Ok(segments);
        }
        tracing::debug!(segmenter = alias, "rejected: invalid segment");
    }

    tracing::debug!("no segmenter applied; using content as a single segment");
    Ok(vec![content.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Segmenter;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed segments and counts how often it was asked to create them.
    struct Fixed {
        applies: bool,
        segments: Vec<&'static str>,
        created: AtomicUsize,
    }

    impl Fixed {
        fn new(applies: bool, segments: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                applies,
                segments,
                created: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Segmenter for Fixed {
        async fn check_condition(&self, _content: &str) -> Result<bool, CascadeError> {
            Ok(self.applies)
        }

        async fn create_segments(&self, _content: &str) -> Result<Vec<String>, CascadeError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(self.segments.iter().map(|s| s.to_string()).collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl Segmenter for Broken {
        async fn create_segments(&self, _content: &str) -> Result<Vec<String>, CascadeError> {
            Err(CascadeError::plugin("model not loaded"))
        }
    }

    fn desc(alias: &str, s: Arc<dyn Segmenter>) -> SegmenterDescriptor {
        SegmenterDescriptor::new(alias, s)
    }

    #[tokio::test]
    async fn no_segmenters_yields_whole_content() {
        let segments = segment_content(&[], "Hello. How are you?").await.unwrap();
        assert_eq!(segments, vec!["Hello. How are you?"]);
    }

    #[tokio::test]
    async fn skipped_precondition_never_creates_segments() {
        let declined = Fixed::new(false, vec!["never used"]);
        let segments = segment_content(&[desc("a", declined.clone())], "some content")
            .await
            .unwrap();

        assert_eq!(segments, vec!["some content"]);
        assert_eq!(declined.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_valid_segmenter_wins_and_short_circuits() {
        let first = Fixed::new(true, vec!["Hello.", "How are you?"]);
        let second = Fixed::new(true, vec!["other segmentation"]);
        let segments = segment_content(
            &[desc("first", first.clone()), desc("second", second.clone())],
            "Hello. How are you?",
        )
        .await
        .unwrap();

        assert_eq!(segments, vec!["Hello.", "How are you?"]);
        assert_eq!(second.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_or_invalid_output_falls_through() {
        let empty = Fixed::new(true, vec![]);
        // "ok" fails the default validation (trimmed length must exceed 3)
        let invalid = Fixed::new(true, vec!["fine segment", "ok"]);
        let good = Fixed::new(true, vec!["third time lucky"]);
        let segments = segment_content(
            &[
                desc("empty", empty),
                desc("invalid", invalid),
                desc("good", good),
            ],
            "content",
        )
        .await
        .unwrap();

        assert_eq!(segments, vec!["third time lucky"]);
    }

    #[tokio::test]
    async fn segmenter_error_propagates_with_alias() {
        let err = segment_content(&[desc("broken", Arc::new(Broken))], "long enough content")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "segmenter 'broken' failed: model not loaded");
    }
}
