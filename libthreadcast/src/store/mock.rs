//! In-memory post store and scheduling trigger for testing
//!
//! Both mocks record every call so tests can assert on exactly which remote
//! operations the orchestrator issued, and both can be told to fail to
//! exercise the persist and schedule failure paths. Post ids are issued as
//! `p1`, `p2`, ... in creation order, queue ids as `q1`, `q2`, ...

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{Result, StoreError};
use crate::store::{PostStore, Scheduler};
use crate::types::{NewPost, NewQueue, Post, PostUpdate, Queue};

/// A call received by `MockPostStore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Create(NewPost),
    Update { id: String, update: PostUpdate },
    Get(String),
    List(String),
    CreateQueue(NewQueue),
    ListQueues(String),
}

#[derive(Debug, Default)]
struct StoreState {
    posts: Vec<Post>,
    issued: usize,
    queues: Vec<Queue>,
    queues_issued: usize,
    calls: Vec<StoreCall>,
    create_error: Option<StoreError>,
    update_error: Option<StoreError>,
    get_error: Option<StoreError>,
}

/// Recording in-memory `PostStore`
///
/// Clones share state, so a test can keep a handle while the orchestrator
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MockPostStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `create` always fails with `error`
    pub fn failing_create(error: StoreError) -> Self {
        let store = Self::new();
        store.set_create_error(Some(error));
        store
    }

    /// A store whose `update` always fails with `error`
    pub fn failing_update(error: StoreError) -> Self {
        let store = Self::new();
        store.set_update_error(Some(error));
        store
    }

    pub fn set_create_error(&self, error: Option<StoreError>) {
        self.state.lock().unwrap().create_error = error;
    }

    pub fn set_update_error(&self, error: Option<StoreError>) {
        self.state.lock().unwrap().update_error = error;
    }

    pub fn set_get_error(&self, error: Option<StoreError>) {
        self.state.lock().unwrap().get_error = error;
    }

    /// Seed a post without recording a call
    pub fn insert(&self, post: Post) {
        let mut state = self.state.lock().unwrap();
        state.posts.retain(|p| p.id != post.id);
        state.posts.push(post);
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, StoreCall::Create(_)))
    }

    pub fn update_calls(&self) -> usize {
        self.count_calls(|c| matches!(c, StoreCall::Update { .. }))
    }

    /// Number of create and update calls
    pub fn write_calls(&self) -> usize {
        self.create_calls() + self.update_calls()
    }

    fn count_calls(&self, predicate: impl Fn(&StoreCall) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| predicate(c))
            .count()
    }

    /// Current stored state of a post
    pub fn post(&self, id: &str) -> Option<Post> {
        self.state
            .lock()
            .unwrap()
            .posts
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.state.lock().unwrap().posts.clone()
    }

    pub fn queues(&self) -> Vec<Queue> {
        self.state.lock().unwrap().queues.clone()
    }

    /// Stamp `scheduled_at` once; later calls leave the post untouched
    fn mark_scheduled(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if post.is_draft {
            return Err(StoreError::Rejected(format!("Post {} is a draft", id)).into());
        }
        if post.scheduled_at.is_none() {
            post.scheduled_at = Some(chrono::Utc::now().timestamp());
        }
        Ok(())
    }
}

#[async_trait]
impl PostStore for MockPostStore {
    async fn create(&self, new_post: NewPost) -> Result<Post> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::Create(new_post.clone()));

        if let Some(error) = state.create_error.clone() {
            return Err(error.into());
        }

        state.issued += 1;
        let now = chrono::Utc::now().timestamp();
        let post = Post {
            id: format!("p{}", state.issued),
            account_ref: new_post.account_ref,
            raw_events: new_post.raw_events,
            is_draft: new_post.is_draft,
            quote_ref: new_post.quote_ref,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn update(&self, id: &str, update: PostUpdate) -> Result<Post> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::Update {
            id: id.to_string(),
            update: update.clone(),
        });

        if let Some(error) = state.update_error.clone() {
            return Err(error.into());
        }

        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(raw_events) = update.raw_events {
            post.raw_events = raw_events;
        }
        if let Some(is_draft) = update.is_draft {
            post.is_draft = is_draft;
            if is_draft {
                post.scheduled_at = None;
            }
        }
        post.updated_at = chrono::Utc::now().timestamp();
        Ok(post.clone())
    }

    async fn get(&self, id: &str) -> Result<Post> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::Get(id.to_string()));

        if let Some(error) = state.get_error.clone() {
            return Err(error.into());
        }

        state
            .posts
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()).into())
    }

    async fn list(&self, account_ref: &str) -> Result<Vec<Post>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::List(account_ref.to_string()));

        Ok(state
            .posts
            .iter()
            .rev()
            .filter(|p| p.account_ref == account_ref)
            .cloned()
            .collect())
    }

    async fn create_queue(&self, new_queue: NewQueue) -> Result<Queue> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::CreateQueue(new_queue.clone()));

        if let Some(error) = state.create_error.clone() {
            return Err(error.into());
        }

        let taken = state
            .queues
            .iter()
            .any(|q| q.account_ref == new_queue.account_ref && q.name == new_queue.name);
        if taken {
            return Err(StoreError::Conflict(format!(
                "Queue '{}' already exists",
                new_queue.name
            ))
            .into());
        }

        state.queues_issued += 1;
        let queue = Queue {
            id: format!("q{}", state.queues_issued),
            account_ref: new_queue.account_ref,
            name: new_queue.name,
            description: new_queue.description,
            created_at: chrono::Utc::now().timestamp(),
        };
        state.queues.push(queue.clone());
        Ok(queue)
    }

    async fn list_queues(&self, account_ref: &str) -> Result<Vec<Queue>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::ListQueues(account_ref.to_string()));

        Ok(state
            .queues
            .iter()
            .filter(|q| q.account_ref == account_ref)
            .cloned()
            .collect())
    }
}

#[derive(Debug)]
struct SchedulerState {
    calls: Vec<String>,
    failures_remaining: usize,
    error: StoreError,
}

/// Recording `Scheduler` that marks posts scheduled in a `MockPostStore`
#[derive(Debug, Clone)]
pub struct MockScheduler {
    store: MockPostStore,
    state: Arc<Mutex<SchedulerState>>,
}

impl MockScheduler {
    pub fn new(store: MockPostStore) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(SchedulerState {
                calls: Vec::new(),
                failures_remaining: 0,
                error: StoreError::Network("Mock scheduling failed".to_string()),
            })),
        }
    }

    /// A scheduler whose next `times` calls fail with `error`
    pub fn failing(store: MockPostStore, error: StoreError, times: usize) -> Self {
        let scheduler = Self::new(store);
        scheduler.fail_next(error, times);
        scheduler
    }

    pub fn fail_next(&self, error: StoreError, times: usize) {
        let mut state = self.state.lock().unwrap();
        state.error = error;
        state.failures_remaining = times;
    }

    /// Post ids passed to `schedule`, in call order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl Scheduler for MockScheduler {
    async fn schedule(&self, post_id: &str) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(post_id.to_string());
            if state.failures_remaining > 0 {
                state.failures_remaining -= 1;
                return Err(state.error.clone().into());
            }
        }
        self.store.mark_scheduled(post_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ThreadcastError;
    use crate::types::{PostStatus, RawEvent};

    fn new_post() -> NewPost {
        NewPost::new("npub1alice", vec![RawEvent::new("hello")])
    }

    #[tokio::test]
    async fn test_create_issues_sequential_ids() {
        let store = MockPostStore::new();
        let first = store.create(new_post()).await.unwrap();
        let second = store.create(new_post()).await.unwrap();

        assert_eq!(first.id, "p1");
        assert_eq!(second.id, "p2");
        assert_eq!(store.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_create_failure_is_recorded() {
        let store = MockPostStore::failing_create(StoreError::Network("down".to_string()));
        let result = store.create(new_post()).await;

        assert!(matches!(
            result,
            Err(ThreadcastError::Store(StoreError::Network(_)))
        ));
        assert_eq!(store.create_calls(), 1);
        assert!(store.posts().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_post() {
        let store = MockPostStore::new();
        let result = store.update("p9", PostUpdate::new(vec![], true)).await;
        assert!(matches!(
            result,
            Err(ThreadcastError::Store(StoreError::NotFound(id))) if id == "p9"
        ));
    }

    #[tokio::test]
    async fn test_list_filters_by_account_newest_first() {
        let store = MockPostStore::new();
        store.create(new_post()).await.unwrap();
        store
            .create(NewPost::new("npub1bob", vec![RawEvent::new("bob")]))
            .await
            .unwrap();
        store.create(new_post()).await.unwrap();

        let ids: Vec<_> = store
            .list("npub1alice")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p3", "p1"]);
    }

    #[tokio::test]
    async fn test_scheduler_is_idempotent() {
        let store = MockPostStore::new();
        let scheduler = MockScheduler::new(store.clone());
        let post = store.create(new_post()).await.unwrap();

        scheduler.schedule(&post.id).await.unwrap();
        let first = store.post(&post.id).unwrap();
        scheduler.schedule(&post.id).await.unwrap();
        let second = store.post(&post.id).unwrap();

        assert_eq!(first.status(), PostStatus::Scheduled);
        assert_eq!(first, second);
        assert_eq!(scheduler.call_count(), 2);
    }

    #[tokio::test]
    async fn test_scheduler_fails_then_recovers() {
        let store = MockPostStore::new();
        let scheduler =
            MockScheduler::failing(store.clone(), StoreError::Network("offline".to_string()), 1);
        let post = store.create(new_post()).await.unwrap();

        assert!(scheduler.schedule(&post.id).await.is_err());
        assert_eq!(
            store.post(&post.id).unwrap().status(),
            PostStatus::Unscheduled
        );

        scheduler.schedule(&post.id).await.unwrap();
        assert_eq!(
            store.post(&post.id).unwrap().status(),
            PostStatus::Scheduled
        );
    }

    #[tokio::test]
    async fn test_scheduler_rejects_drafts() {
        let store = MockPostStore::new();
        let scheduler = MockScheduler::new(store.clone());
        let post = store.create(new_post().with_draft(true)).await.unwrap();

        let result = scheduler.schedule(&post.id).await;
        assert!(matches!(
            result,
            Err(ThreadcastError::Store(StoreError::Rejected(_)))
        ));
    }

    #[tokio::test]
    async fn test_queue_names_are_unique_per_account() {
        let store = MockPostStore::new();
        let new_queue = NewQueue {
            account_ref: "npub1alice".to_string(),
            name: "Weekly".to_string(),
            description: None,
        };

        let first = store.create_queue(new_queue.clone()).await.unwrap();
        assert_eq!(first.id, "q1");

        let result = store.create_queue(new_queue).await;
        assert!(matches!(
            result,
            Err(ThreadcastError::Store(StoreError::Conflict(_)))
        ));

        let other = store
            .create_queue(NewQueue {
                account_ref: "npub1bob".to_string(),
                name: "Weekly".to_string(),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(other.id, "q2");
        assert_eq!(store.list_queues("npub1alice").await.unwrap(), vec![first]);
    }
}
