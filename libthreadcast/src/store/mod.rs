//! Contracts for the post record store and the scheduling trigger
//!
//! The orchestrator only talks to these traits. `crate::db::Database`
//! implements both on SQLite; `mock` provides recording in-memory
//! implementations for tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{NewPost, NewQueue, Post, PostUpdate, Queue};

// also used by the integration tests under tests/
pub mod mock;

/// Persistence and query interface for posts
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Persist a new post and return it with its assigned id
    ///
    /// # Errors
    ///
    /// Implementations report failures as `ThreadcastError::Store` (or
    /// `Database` for local backends). The error is surfaced to callers
    /// unchanged.
    async fn create(&self, new_post: NewPost) -> Result<Post>;

    /// Replace `raw_events` and/or `is_draft` of an existing post wholesale
    async fn update(&self, id: &str, update: PostUpdate) -> Result<Post>;

    /// Fetch a single post
    ///
    /// Unknown ids are reported as `StoreError::NotFound`.
    async fn get(&self, id: &str) -> Result<Post>;

    /// All posts owned by an account, newest first
    async fn list(&self, account_ref: &str) -> Result<Vec<Post>>;

    /// Create a named queue for an account
    ///
    /// A second queue with the same name for the same account is reported as
    /// `StoreError::Conflict`.
    async fn create_queue(&self, new_queue: NewQueue) -> Result<Queue>;

    /// All queues owned by an account, oldest first
    async fn list_queues(&self, account_ref: &str) -> Result<Vec<Queue>>;
}

/// Action that marks a persisted post for future publication
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Schedule the given post
    ///
    /// Must be idempotent per post id: scheduling an already scheduled post
    /// succeeds without changing it.
    async fn schedule(&self, post_id: &str) -> Result<()>;
}
