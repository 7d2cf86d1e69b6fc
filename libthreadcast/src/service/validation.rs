//! Validation service for composed threads
//!
//! Produces per-segment feedback for a live composer view and enforces the
//! size limits from `[compose]` before the orchestrator issues any write.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::composer::derive_submission;
use crate::error::ValidationError;
use crate::types::{RawEvent, Segment};
use crate::Config;

/// Validation service
#[derive(Clone)]
pub struct ValidationService {
    config: Arc<Config>,
}

/// Feedback for a single segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentValidation {
    pub segment_id: String,
    /// Characters (not bytes) in the trimmed content
    pub char_count: usize,
    /// Blank segments are dropped on submission
    pub blank: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Feedback for the whole thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    /// True if the thread can be submitted as is
    pub valid: bool,
    /// Number of raw events a submission would contain
    pub submitted_segments: usize,
    /// Thread-level errors (empty thread, too many segments)
    pub errors: Vec<String>,
    pub segments: Vec<SegmentValidation>,
}

impl ValidationService {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Validate a segment sequence as the composer currently holds it
    pub fn validate(&self, segments: &[Segment]) -> ValidationResponse {
        let max_bytes = self.config.compose.max_segment_bytes;
        let mut errors = Vec::new();

        let submission = derive_submission(segments);
        if submission.is_empty() {
            errors.push(ValidationError::EmptyThread.to_string());
        } else if let Err(e @ ValidationError::TooManySegments { .. }) =
            self.check_limits(&submission)
        {
            // oversized segments are reported per segment below
            errors.push(e.to_string());
        }

        let segments: Vec<SegmentValidation> = segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let trimmed = segment.content().trim();
                let blank = trimmed.is_empty();
                let mut segment_errors = Vec::new();
                let mut warnings = Vec::new();

                if blank {
                    warnings.push(format!(
                        "Segment {} is blank and will be skipped",
                        index + 1
                    ));
                } else if trimmed.len() > max_bytes {
                    segment_errors.push(format!(
                        "Segment {} is {} bytes, maximum is {} bytes",
                        index + 1,
                        trimmed.len(),
                        max_bytes
                    ));
                }

                SegmentValidation {
                    segment_id: segment.id().to_string(),
                    char_count: trimmed.chars().count(),
                    blank,
                    errors: segment_errors,
                    warnings,
                }
            })
            .collect();

        let valid = errors.is_empty() && segments.iter().all(|s| s.errors.is_empty());

        ValidationResponse {
            valid,
            submitted_segments: submission.len(),
            errors,
            segments,
        }
    }

    /// Check a derived submission against the configured size limits
    ///
    /// Segment indexes in errors are 1-based positions in the submission.
    pub fn check_limits(&self, raw_events: &[RawEvent]) -> Result<(), ValidationError> {
        let limits = &self.config.compose;

        if raw_events.len() > limits.max_segments {
            return Err(ValidationError::TooManySegments {
                count: raw_events.len(),
                max: limits.max_segments,
            });
        }

        if let Some((index, event)) = raw_events
            .iter()
            .enumerate()
            .find(|(_, e)| e.content.len() > limits.max_segment_bytes)
        {
            return Err(ValidationError::SegmentTooLarge {
                index: index + 1,
                size: event.content.len(),
                max: limits.max_segment_bytes,
            });
        }

        Ok(())
    }
}
