//! Thread composer state
//!
//! Owns the ordered segment sequence of one composition session and
//! publishes the submit-ready `RawEvent` list to observers after every
//! mutation, so a containing view never has to poll.
//!
//! # Example
//!
//! ```
//! use libthreadcast::{RawEvent, ThreadComposer};
//!
//! let mut composer = ThreadComposer::new();
//! let observer = composer.subscribe();
//!
//! let first = composer.segments()[0].id().clone();
//! composer.update_segment(&first, "hello").unwrap();
//! composer.push_segment("   ");
//! composer.push_segment("world");
//!
//! assert_eq!(
//!     *observer.borrow(),
//!     vec![RawEvent::new("hello"), RawEvent::new("world")]
//! );
//! ```

use std::collections::HashSet;

use tokio::sync::watch;
use tracing::debug;

use crate::error::{Result, ThreadcastError};
use crate::types::{Post, RawEvent, Segment, SegmentId};

/// Receiver side of the composer's change notification
pub type SubmissionReceiver = watch::Receiver<Vec<RawEvent>>;

/// Derive the ordered submission list from a segment sequence
///
/// Each segment is trimmed; segments left empty are discarded. Relative
/// order of the retained segments is preserved.
pub fn derive_submission(segments: &[Segment]) -> Vec<RawEvent> {
    segments.iter().filter_map(RawEvent::from_segment).collect()
}

/// In-memory state of a thread being composed
#[derive(Debug)]
pub struct ThreadComposer {
    segments: Vec<Segment>,
    last_issued: u64,
    submission: watch::Sender<Vec<RawEvent>>,
}

impl Default for ThreadComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadComposer {
    /// Start a fresh thread with a single empty segment
    pub fn new() -> Self {
        let mut composer = Self::blank();
        let id = composer.issue_id();
        composer.segments.push(Segment::empty(id));
        composer
    }

    /// Seed composer state, typically when entering edit mode
    ///
    /// `None` (or an empty sequence) yields a single empty segment.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if two segments share an id.
    pub fn initialize(segments: Option<Vec<Segment>>) -> Result<Self> {
        match segments {
            Some(segments) if !segments.is_empty() => {
                ensure_unique_ids(&segments)?;
                let mut composer = Self::blank();
                composer.segments = segments;
                composer.publish();
                Ok(composer)
            }
            _ => Ok(Self::new()),
        }
    }

    /// Rebuild composer state from a persisted post
    ///
    /// Every raw event becomes one segment, in stored order, with a freshly
    /// issued id.
    pub fn from_post(post: &Post) -> Self {
        if post.raw_events.is_empty() {
            return Self::new();
        }

        let mut composer = Self::blank();
        for event in &post.raw_events {
            let id = composer.issue_id();
            composer.segments.push(Segment::new(id, event.content.clone()));
        }
        composer.publish();
        composer
    }

    fn blank() -> Self {
        let (submission, _) = watch::channel(Vec::new());
        Self {
            segments: Vec::new(),
            last_issued: 0,
            submission,
        }
    }

    /// Replace the whole segment sequence and notify observers
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if two segments share an id; the previous
    /// state is kept.
    pub fn set_segments(&mut self, segments: Vec<Segment>) -> Result<()> {
        ensure_unique_ids(&segments)?;
        self.segments = segments;
        self.publish();
        Ok(())
    }

    /// Append a segment and return its newly issued id
    pub fn push_segment(&mut self, content: impl Into<String>) -> SegmentId {
        let id = self.issue_id();
        self.segments.push(Segment::new(id.clone(), content));
        self.publish();
        id
    }

    /// Replace the content of one segment
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if no segment has the given id.
    pub fn update_segment(&mut self, id: &SegmentId, content: impl Into<String>) -> Result<()> {
        let segment = self
            .segments
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or_else(|| ThreadcastError::InvalidInput(format!("Segment not found: {}", id)))?;
        segment.set_content(content);
        self.publish();
        Ok(())
    }

    /// Remove one segment, returning it
    ///
    /// The thread may become empty; that state is valid while editing but
    /// cannot be submitted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if no segment has the given id.
    pub fn remove_segment(&mut self, id: &SegmentId) -> Result<Segment> {
        let index = self
            .segments
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| ThreadcastError::InvalidInput(format!("Segment not found: {}", id)))?;
        let removed = self.segments.remove(index);
        self.publish();
        Ok(removed)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Submission-ready projection of the current state
    pub fn derive_submission(&self) -> Vec<RawEvent> {
        derive_submission(&self.segments)
    }

    /// True if at least one segment has non-blank content
    pub fn is_submittable(&self) -> bool {
        self.segments.iter().any(|s| !s.is_blank())
    }

    /// Register an observer of the derived submission list
    ///
    /// The receiver starts at the current derivation and is marked changed
    /// after every subsequent mutation.
    pub fn subscribe(&self) -> SubmissionReceiver {
        self.submission.subscribe()
    }

    /// Consume the composer, handing the segments to the caller
    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    fn issue_id(&mut self) -> SegmentId {
        loop {
            self.last_issued += 1;
            let candidate = SegmentId::new(self.last_issued.to_string());
            if !self.segments.iter().any(|s| s.id() == &candidate) {
                return candidate;
            }
        }
    }

    fn publish(&self) {
        let submission = derive_submission(&self.segments);
        debug!(
            segments = self.segments.len(),
            submittable = submission.len(),
            "Composer state changed"
        );
        self.submission.send_replace(submission);
    }
}

fn ensure_unique_ids(segments: &[Segment]) -> Result<()> {
    let mut seen = HashSet::with_capacity(segments.len());
    for segment in segments {
        if !seen.insert(segment.id()) {
            return Err(ThreadcastError::InvalidInput(format!(
                "Duplicate segment id: {}",
                segment.id()
            )));
        }
    }
    Ok(())
}
