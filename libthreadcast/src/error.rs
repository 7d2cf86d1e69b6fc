//! Error types for Threadcast

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ThreadcastError>;

#[derive(Error, Debug)]
pub enum ThreadcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl ThreadcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ThreadcastError::InvalidInput(_) => 3,
            ThreadcastError::Validation(_) => 3,
            ThreadcastError::Store(StoreError::NotFound(_)) => 3,
            ThreadcastError::Store(_) => 1,
            ThreadcastError::Config(_) => 1,
            ThreadcastError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row for post {post_id}: {reason}")]
    CorruptRow { post_id: String, reason: String },
}

/// Failures reported by post store and scheduling trigger implementations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend failure: {0}")]
    Backend(String),
}

/// Local precondition failures detected before any remote call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty thread")]
    EmptyThread,

    #[error("no account")]
    NoAccount,

    #[error("too many segments ({count} > {max})")]
    TooManySegments { count: usize, max: usize },

    #[error("segment {index} exceeds maximum size ({size} > {max} bytes)")]
    SegmentTooLarge {
        index: usize,
        size: usize,
        max: usize,
    },

    #[error("blank queue name")]
    BlankQueueName,
}

/// Which step of a composition failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input rejected locally, nothing was written
    Validation,
    /// The create or update call failed
    Persist,
    /// The post was persisted but the scheduling trigger failed
    Schedule,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Persist => write!(f, "persist"),
            ErrorKind::Schedule => write!(f, "schedule"),
        }
    }
}

/// Error returned by the composition orchestrator
///
/// Each variant corresponds to the step that failed so callers can offer the
/// right corrective action: fix the input, retry the write, or retry only
/// the schedule step using the carried post id.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to persist post: {source}")]
    Persist {
        #[source]
        source: ThreadcastError,
    },

    #[error("Post {post_id} was saved but could not be scheduled: {source}")]
    Schedule {
        post_id: String,
        #[source]
        source: ThreadcastError,
    },
}

impl ComposeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ComposeError::Validation(_) => ErrorKind::Validation,
            ComposeError::Persist { .. } => ErrorKind::Persist,
            ComposeError::Schedule { .. } => ErrorKind::Schedule,
        }
    }

    /// Persisted post id, only present when the schedule step failed
    pub fn post_id(&self) -> Option<&str> {
        match self {
            ComposeError::Schedule { post_id, .. } => Some(post_id),
            _ => None,
        }
    }

    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ComposeError::Validation(_) => 3,
            ComposeError::Persist { .. } => 1,
            ComposeError::Schedule { .. } => 4,
        }
    }
}
