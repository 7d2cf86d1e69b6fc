//! SQLite post record store and scheduling trigger

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::debug;

use crate::error::{DbError, Result, StoreError, ThreadcastError};
use crate::store::{PostStore, Scheduler};
use crate::types::{NewPost, NewQueue, Post, PostUpdate, Queue, RawEvent};

const POST_COLUMNS: &str =
    "id, account_ref, raw_events, is_draft, quote_ref, scheduled_at, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Insert a post and return it with its assigned id
    pub async fn create_post(&self, new_post: &NewPost) -> Result<Post> {
        if new_post.account_ref.trim().is_empty() {
            return Err(StoreError::Rejected("account_ref is required".to_string()).into());
        }
        ensure_events(&new_post.raw_events)?;

        let now = chrono::Utc::now().timestamp();
        let post = Post {
            id: uuid::Uuid::new_v4().to_string(),
            account_ref: new_post.account_ref.clone(),
            raw_events: new_post.raw_events.clone(),
            is_draft: new_post.is_draft,
            quote_ref: new_post.quote_ref.clone(),
            scheduled_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO posts (
                id, account_ref, raw_events, is_draft, quote_ref, scheduled_at, created_at,
                updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.account_ref)
        .bind(encode_events(&post.raw_events)?)
        .bind(post.is_draft)
        .bind(&post.quote_ref)
        .bind(post.scheduled_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        debug!(post_id = %post.id, draft = post.is_draft, "Inserted post");
        Ok(post)
    }

    /// Replace `raw_events` and/or `is_draft` of an existing post
    ///
    /// Moving a post back to draft clears its schedule. The change is a
    /// single statement, so overlapping edits wait on the busy timeout and
    /// the last write wins.
    pub async fn update_post(&self, post_id: &str, update: &PostUpdate) -> Result<Post> {
        let raw_events = match &update.raw_events {
            Some(raw_events) => {
                ensure_events(raw_events)?;
                Some(encode_events(raw_events)?)
            }
            None => None,
        };
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE posts
            SET raw_events = COALESCE(?, raw_events),
                is_draft = COALESCE(?, is_draft),
                scheduled_at = CASE WHEN ? THEN NULL ELSE scheduled_at END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(raw_events)
        .bind(update.is_draft)
        .bind(update.is_draft == Some(true))
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(post_id.to_string()).into());
        }

        let post = self
            .get_post(post_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(post_id.to_string()))?;

        debug!(post_id = %post.id, draft = post.is_draft, "Updated post");
        Ok(post)
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let select = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        let row = sqlx::query(&select)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_post).transpose()
    }

    /// All posts for an account, newest first
    pub async fn list_posts(&self, account_ref: &str) -> Result<Vec<Post>> {
        let select = format!(
            "SELECT {} FROM posts WHERE account_ref = ? ORDER BY created_at DESC, rowid DESC",
            POST_COLUMNS
        );
        let rows = sqlx::query(&select)
            .bind(account_ref)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_post).collect()
    }

    /// Stamp a non-draft post as scheduled
    ///
    /// Returns `true` if this call scheduled the post and `false` if it was
    /// already scheduled, in which case nothing changes.
    pub async fn mark_scheduled(&self, post_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE posts SET scheduled_at = ?, updated_at = ?
            WHERE id = ? AND is_draft = 0 AND scheduled_at IS NULL
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        match self.get_post(post_id).await? {
            None => Err(StoreError::NotFound(post_id.to_string()).into()),
            Some(post) if post.is_draft => {
                Err(StoreError::Rejected(format!("Post {} is a draft", post_id)).into())
            }
            Some(_) => {
                debug!(post_id, "Post already scheduled");
                Ok(false)
            }
        }
    }
    /// Insert a named queue for an account
    ///
    /// Names are unique per account.
    pub async fn insert_queue(&self, new_queue: &NewQueue) -> Result<Queue> {
        if new_queue.account_ref.trim().is_empty() {
            return Err(StoreError::Rejected("account_ref is required".to_string()).into());
        }
        if new_queue.name.trim().is_empty() {
            return Err(StoreError::Rejected("queue name is required".to_string()).into());
        }

        let queue = Queue {
            id: uuid::Uuid::new_v4().to_string(),
            account_ref: new_queue.account_ref.clone(),
            name: new_queue.name.clone(),
            description: new_queue.description.clone(),
            created_at: chrono::Utc::now().timestamp(),
        };

        sqlx::query(
            r#"
            INSERT INTO queues (id, account_ref, name, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&queue.id)
        .bind(&queue.account_ref)
        .bind(&queue.name)
        .bind(&queue.description)
        .bind(queue.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ThreadcastError::from(StoreError::Conflict(format!(
                    "Queue '{}' already exists",
                    queue.name
                )))
            }
            e => DbError::SqlxError(e).into(),
        })?;

        debug!(queue_id = %queue.id, name = %queue.name, "Inserted queue");
        Ok(queue)
    }

    /// All queues for an account, oldest first
    pub async fn fetch_queues(&self, account_ref: &str) -> Result<Vec<Queue>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_ref, name, description, created_at
            FROM queues
            WHERE account_ref = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(account_ref)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_queue).collect()
    }
}

#[async_trait]
impl PostStore for Database {
    async fn create(&self, new_post: NewPost) -> Result<Post> {
        self.create_post(&new_post).await
    }

    async fn update(&self, id: &str, update: PostUpdate) -> Result<Post> {
        self.update_post(id, &update).await
    }

    async fn get(&self, id: &str) -> Result<Post> {
        self.get_post(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()).into())
    }

    async fn list(&self, account_ref: &str) -> Result<Vec<Post>> {
        self.list_posts(account_ref).await
    }

    async fn create_queue(&self, new_queue: NewQueue) -> Result<Queue> {
        self.insert_queue(&new_queue).await
    }

    async fn list_queues(&self, account_ref: &str) -> Result<Vec<Queue>> {
        self.fetch_queues(account_ref).await
    }
}

#[async_trait]
impl Scheduler for Database {
    async fn schedule(&self, post_id: &str) -> Result<()> {
        self.mark_scheduled(post_id).await.map(|_| ())
    }
}

fn ensure_events(raw_events: &[RawEvent]) -> Result<()> {
    if raw_events.is_empty() {
        return Err(StoreError::Rejected("raw_events cannot be empty".to_string()).into());
    }
    Ok(())
}

fn encode_events(raw_events: &[RawEvent]) -> Result<String> {
    serde_json::to_string(raw_events)
        .map_err(|e| StoreError::Backend(format!("Failed to encode raw events: {}", e)).into())
}

fn row_to_post(row: &SqliteRow) -> Result<Post> {
    let id: String = row.try_get("id").map_err(DbError::SqlxError)?;
    let raw_events: String = row.try_get("raw_events").map_err(DbError::SqlxError)?;
    let raw_events: Vec<RawEvent> =
        serde_json::from_str(&raw_events).map_err(|e| DbError::CorruptRow {
            post_id: id.clone(),
            reason: format!("raw_events is not valid JSON: {}", e),
        })?;

    Ok(Post {
        account_ref: row.try_get("account_ref").map_err(DbError::SqlxError)?,
        raw_events,
        is_draft: row.try_get::<i64, _>("is_draft").map_err(DbError::SqlxError)? != 0,
        quote_ref: row.try_get("quote_ref").map_err(DbError::SqlxError)?,
        scheduled_at: row.try_get("scheduled_at").map_err(DbError::SqlxError)?,
        created_at: row.try_get("created_at").map_err(DbError::SqlxError)?,
        updated_at: row.try_get("updated_at").map_err(DbError::SqlxError)?,
        id,
    })
}

fn row_to_queue(row: &SqliteRow) -> Result<Queue> {
    Ok(Queue {
        id: row.try_get("id").map_err(DbError::SqlxError)?,
        account_ref: row.try_get("account_ref").map_err(DbError::SqlxError)?,
        name: row.try_get("name").map_err(DbError::SqlxError)?,
        description: row.try_get("description").map_err(DbError::SqlxError)?,
        created_at: row.try_get("created_at").map_err(DbError::SqlxError)?,
    })
}
