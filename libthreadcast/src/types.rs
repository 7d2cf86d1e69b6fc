//! Core types for Threadcast

use serde::{Deserialize, Serialize};

/// Opaque identifier of a segment within one thread
///
/// Identifiers are only meaningful inside a composition session; they are
/// never persisted and carry no ordering information.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SegmentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SegmentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One editable unit of a thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    id: SegmentId,
    content: String,
}

impl Segment {
    pub fn new(id: impl Into<SegmentId>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    /// Create a segment with no content yet
    pub fn empty(id: impl Into<SegmentId>) -> Self {
        Self::new(id, String::new())
    }

    pub fn id(&self) -> &SegmentId {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Replace the segment body; the id never changes
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// True if the segment would be dropped from a submission
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Submission-ready projection of a segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub content: String,
}

impl RawEvent {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Project a segment, trimming its body. Blank segments yield `None`.
    pub fn from_segment(segment: &Segment) -> Option<Self> {
        let trimmed = segment.content().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self::new(trimmed))
        }
    }
}

/// Lifecycle state derived from a post's flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Saved for later editing, not scheduled
    Draft,
    /// Submitted but the scheduling trigger has not taken effect
    Unscheduled,
    /// Queued for publication
    Scheduled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Unscheduled => "unscheduled",
            PostStatus::Scheduled => "scheduled",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "unscheduled" => Ok(PostStatus::Unscheduled),
            "scheduled" => Ok(PostStatus::Scheduled),
            _ => Err(format!(
                "Invalid status: '{}'. Valid options: draft, unscheduled, scheduled",
                s
            )),
        }
    }
}

/// A persisted thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub account_ref: String,
    pub raw_events: Vec<RawEvent>,
    pub is_draft: bool,
    pub quote_ref: Option<String>,
    pub scheduled_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Post {
    pub fn status(&self) -> PostStatus {
        if self.is_draft {
            PostStatus::Draft
        } else if self.scheduled_at.is_some() {
            PostStatus::Scheduled
        } else {
            PostStatus::Unscheduled
        }
    }
}

/// Payload for creating a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub account_ref: String,
    pub raw_events: Vec<RawEvent>,
    pub is_draft: bool,
    pub quote_ref: Option<String>,
}

impl NewPost {
    /// A non-draft post with no quote
    pub fn new(account_ref: impl Into<String>, raw_events: Vec<RawEvent>) -> Self {
        Self {
            account_ref: account_ref.into(),
            raw_events,
            is_draft: false,
            quote_ref: None,
        }
    }

    pub fn with_draft(mut self, is_draft: bool) -> Self {
        self.is_draft = is_draft;
        self
    }

    pub fn with_quote(mut self, quote_ref: Option<String>) -> Self {
        self.quote_ref = quote_ref;
        self
    }
}

/// Wholesale replacement of a post's mutable fields
///
/// `None` leaves the field untouched. `raw_events` is never merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUpdate {
    pub raw_events: Option<Vec<RawEvent>>,
    pub is_draft: Option<bool>,
}

impl PostUpdate {
    pub fn new(raw_events: Vec<RawEvent>, is_draft: bool) -> Self {
        Self {
            raw_events: Some(raw_events),
            is_draft: Some(is_draft),
        }
    }
}

/// A named queue an account uses to group scheduled threads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub id: String,
    pub account_ref: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
}

/// Payload for creating a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQueue {
    pub account_ref: String,
    pub name: String,
    pub description: Option<String>,
}
