//! Queue service for an account's posts and named queues
//!
//! Listing is a read-only view over `PostStore::list` that derives each
//! post's status and a short preview of its opening segment. Named queues
//! are validated locally before the store is called.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ValidationError;
use crate::store::PostStore;
use crate::types::{NewQueue, Post, PostStatus, Queue};
use crate::Result;

/// Characters of the first segment shown in a queue entry
pub const PREVIEW_CHARS: usize = 80;

/// Queue service
#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn PostStore>,
}

/// Summary row for one post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub status: PostStatus,
    pub preview: String,
    pub segments: usize,
    pub quote_ref: Option<String>,
    pub scheduled_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Post> for QueueEntry {
    fn from(post: &Post) -> Self {
        let first = post
            .raw_events
            .first()
            .map(|e| e.content.as_str())
            .unwrap_or_default();

        Self {
            id: post.id.clone(),
            status: post.status(),
            preview: preview(first, PREVIEW_CHARS),
            segments: post.raw_events.len(),
            quote_ref: post.quote_ref.clone(),
            scheduled_at: post.scheduled_at,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// Post counts per status for one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub drafts: usize,
    pub unscheduled: usize,
    pub scheduled: usize,
}

impl QueueService {
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self { store }
    }

    /// List an account's posts, newest first, optionally filtered by status
    pub async fn list(
        &self,
        account_ref: &str,
        status: Option<PostStatus>,
    ) -> Result<Vec<QueueEntry>> {
        let posts = self.store.list(account_ref).await?;
        Ok(posts
            .iter()
            .filter(|p| status.map_or(true, |s| p.status() == s))
            .map(QueueEntry::from)
            .collect())
    }

    pub async fn stats(&self, account_ref: &str) -> Result<QueueStats> {
        let posts = self.store.list(account_ref).await?;
        let mut stats = QueueStats {
            total: posts.len(),
            ..Default::default()
        };
        for post in &posts {
            match post.status() {
                PostStatus::Draft => stats.drafts += 1,
                PostStatus::Unscheduled => stats.unscheduled += 1,
                PostStatus::Scheduled => stats.scheduled += 1,
            }
        }
        Ok(stats)
    }

    /// Create a named queue for an account
    ///
    /// The name is trimmed and a blank description is dropped. A missing
    /// account or blank name fails without calling the store.
    pub async fn create_queue(
        &self,
        account_ref: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Queue> {
        let account_ref = account_ref.trim();
        if account_ref.is_empty() {
            return Err(ValidationError::NoAccount.into());
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::BlankQueueName.into());
        }

        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        let queue = self
            .store
            .create_queue(NewQueue {
                account_ref: account_ref.to_string(),
                name: name.to_string(),
                description,
            })
            .await?;
        info!(queue_id = %queue.id, name = %queue.name, "Created queue");
        Ok(queue)
    }

    /// Named queues owned by an account, oldest first
    pub async fn list_queues(&self, account_ref: &str) -> Result<Vec<Queue>> {
        let account_ref = account_ref.trim();
        if account_ref.is_empty() {
            return Err(ValidationError::NoAccount.into());
        }
        self.store.list_queues(account_ref).await
    }
}

/// Single-line preview truncated to `max_chars` characters
pub fn preview(content: &str, max_chars: usize) -> String {
    let line = content.lines().next().unwrap_or_default();
    let truncated = content.lines().nth(1).is_some() || line.chars().count() > max_chars;
    if !truncated {
        return line.to_string();
    }
    let mut shortened: String = line.chars().take(max_chars.saturating_sub(3)).collect();
    shortened.push_str("...");
    shortened
}

/// Compact account reference for display, e.g. `npub1a...wxyz`
pub fn short_account(account_ref: &str) -> String {
    let chars: Vec<char> = account_ref.chars().collect();
    if chars.len() <= 13 {
        return account_ref.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, ThreadcastError};
    use crate::store::mock::{MockPostStore, MockScheduler, StoreCall};
    use crate::store::Scheduler;
    use crate::types::{NewPost, RawEvent};

    async fn seeded() -> (MockPostStore, QueueService) {
        let store = MockPostStore::new();
        let scheduler = MockScheduler::new(store.clone());

        let draft = NewPost::new("npub1alice", vec![RawEvent::new("draft one")]);
        store.create(draft.with_draft(true)).await.unwrap();
        store
            .create(NewPost::new(
                "npub1alice",
                vec![RawEvent::new("pending"), RawEvent::new("second")],
            ))
            .await
            .unwrap();
        let scheduled = store
            .create(NewPost::new("npub1alice", vec![RawEvent::new("queued")]))
            .await
            .unwrap();
        scheduler.schedule(&scheduled.id).await.unwrap();
        store
            .create(NewPost::new("npub1bob", vec![RawEvent::new("not mine")]))
            .await
            .unwrap();

        let service = QueueService::new(Arc::new(store.clone()));
        (store, service)
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_, service) = seeded().await;
        let entries = service.list("npub1alice", None).await.unwrap();

        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p2", "p1"]);
        assert_eq!(entries[1].segments, 2);
        assert_eq!(entries[1].preview, "pending");
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let (_, service) = seeded().await;

        let drafts = service
            .list("npub1alice", Some(PostStatus::Draft))
            .await
            .unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, "p1");

        let scheduled = service
            .list("npub1alice", Some(PostStatus::Scheduled))
            .await
            .unwrap();
        assert_eq!(scheduled.len(), 1);
        assert!(scheduled[0].scheduled_at.is_some());
    }

    #[tokio::test]
    async fn test_stats() {
        let (_, service) = seeded().await;
        let stats = service.stats("npub1alice").await.unwrap();
        assert_eq!(
            stats,
            QueueStats {
                total: 3,
                drafts: 1,
                unscheduled: 1,
                scheduled: 1,
            }
        );
        assert_eq!(
            service.stats("npub1nobody").await.unwrap(),
            QueueStats::default()
        );
    }

    #[tokio::test]
    async fn test_create_queue_trims_input() {
        let store = MockPostStore::new();
        let service = QueueService::new(Arc::new(store.clone()));

        let queue = service
            .create_queue(" npub1alice ", "  Weekly tips ", Some("   "))
            .await
            .unwrap();
        assert_eq!(queue.name, "Weekly tips");
        assert_eq!(queue.account_ref, "npub1alice");
        assert_eq!(queue.description, None);

        let queue = service
            .create_queue("npub1alice", "Evergreen", Some("Reposts"))
            .await
            .unwrap();
        assert_eq!(queue.description.as_deref(), Some("Reposts"));

        let names: Vec<_> = service
            .list_queues("npub1alice")
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.name)
            .collect();
        assert_eq!(names, vec!["Weekly tips", "Evergreen"]);
    }

    #[tokio::test]
    async fn test_create_queue_validates_before_store() {
        let store = MockPostStore::new();
        let service = QueueService::new(Arc::new(store.clone()));

        let result = service.create_queue("npub1alice", "   ", None).await;
        assert!(matches!(
            result,
            Err(ThreadcastError::Validation(ValidationError::BlankQueueName))
        ));

        let result = service.create_queue("  ", "Weekly", None).await;
        assert!(matches!(
            result,
            Err(ThreadcastError::Validation(ValidationError::NoAccount))
        ));

        let result = service.list_queues("").await;
        assert!(matches!(
            result,
            Err(ThreadcastError::Validation(ValidationError::NoAccount))
        ));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_queue_passes_store_conflict_through() {
        let store = MockPostStore::new();
        let service = QueueService::new(Arc::new(store.clone()));

        service.create_queue("npub1alice", "Weekly", None).await.unwrap();
        let result = service.create_queue("npub1alice", "Weekly", None).await;
        assert!(matches!(
            result,
            Err(ThreadcastError::Store(StoreError::Conflict(_)))
        ));

        let creates = store
            .calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::CreateQueue(_)))
            .count();
        assert_eq!(creates, 2);
    }

    #[test]
    fn test_preview_truncation() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("exactly10!", 10), "exactly10!");
        assert_eq!(preview("this is too long", 10), "this is...");
        assert_eq!(preview("first line\nsecond", 80), "first line...");
        assert_eq!(preview("世界世界世界世界世界世界", 5), "世界...");
        assert_eq!(preview("", 10), "");
    }

    #[test]
    fn test_short_account() {
        assert_eq!(short_account("npub1alice"), "npub1alice");
        assert_eq!(
            short_account("npub1qqqqqqqqqqqqqqqqqqqqwxyz"),
            "npub1q...wxyz"
        );
    }
}
