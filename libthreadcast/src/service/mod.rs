//! Service layer for Threadcast
//!
//! Business logic shared by every front end (the CLI today, an editor UI
//! later) so none of them re-implements the compose workflow.
//!
//! # Architecture
//!
//! `ThreadcastService` is the facade and entry point. It wires the
//! sub-services to one post store, one scheduling trigger and one event bus:
//!
//! - `ComposeService`: save drafts and schedule threads
//! - `QueueService`: list an account's posts and manage its named queues
//! - `ValidationService`: live segment feedback and size limits
//! - `EventBus`: progress event distribution
//!
//! # Example
//!
//! ```no_run
//! use libthreadcast::service::compose::ComposeRequest;
//! use libthreadcast::service::ThreadcastService;
//! use libthreadcast::Segment;
//!
//! # async fn example() -> libthreadcast::Result<()> {
//! let service = ThreadcastService::new().await?;
//!
//! let request = ComposeRequest::create(
//!     "npub1alice",
//!     vec![Segment::new("1", "Hello"), Segment::new("2", "world")],
//! );
//!
//! match service.compose().schedule_thread(&request).await {
//!     Ok(outcome) => println!("{} ({})", outcome.message, outcome.post_id),
//!     Err(e) => eprintln!("{}", e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod compose;
pub mod events;
pub mod queue;
pub mod validation;

pub use compose::{ComposeAction, ComposeOutcome, ComposeReport, ComposeRequest};
pub use events::Event;

use std::sync::Arc;

use self::compose::ComposeService;
use self::events::EventBus;
use self::queue::QueueService;
use self::validation::ValidationService;
use crate::store::{PostStore, Scheduler};
use crate::{Config, Database, Result};

/// Main service facade that coordinates all sub-services
///
/// All sub-services share the same store, trigger, `Arc<Config>` and event
/// bus.
pub struct ThreadcastService {
    db: Option<Arc<Database>>,
    config: Arc<Config>,
    compose: ComposeService,
    queue: QueueService,
    validation: ValidationService,
    event_bus: EventBus,
}

impl ThreadcastService {
    /// Create a service with configuration from the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or the
    /// database cannot be opened and migrated.
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    /// Create a service backed by the SQLite database named in `config`
    ///
    /// The database serves as both post store and scheduling trigger.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db = Arc::new(Database::new(&config.database.path).await?);

        let mut service = Self::with_backends(
            config,
            Arc::clone(&db) as Arc<dyn PostStore>,
            Arc::clone(&db) as Arc<dyn Scheduler>,
        );
        service.db = Some(db);
        Ok(service)
    }

    /// Create a service over arbitrary store and trigger implementations
    pub fn with_backends(
        config: Config,
        store: Arc<dyn PostStore>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let config = Arc::new(config);
        let event_bus = EventBus::new(100);

        let compose = ComposeService::new(
            Arc::clone(&store),
            scheduler,
            Arc::clone(&config),
            event_bus.clone(),
        );
        let queue = QueueService::new(store);
        let validation = ValidationService::new(Arc::clone(&config));

        Self {
            db: None,
            config,
            compose,
            queue,
            validation,
            event_bus,
        }
    }

    /// The SQLite database, if the service was built from configuration
    pub fn database(&self) -> Option<&Database> {
        self.db.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn compose(&self) -> &ComposeService {
        &self.compose
    }

    pub fn queue(&self) -> &QueueService {
        &self.queue
    }

    pub fn validation(&self) -> &ValidationService {
        &self.validation
    }

    /// Subscribe to compose events
    ///
    /// Events emitted before subscribing are not replayed.
    pub fn subscribe(&self) -> events::EventReceiver {
        self.event_bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::{MockPostStore, MockScheduler};
    use crate::types::Segment;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_facade_shares_store_between_services() {
        let store = MockPostStore::new();
        let scheduler = MockScheduler::new(store.clone());
        let service = ThreadcastService::with_backends(
            Config::default_config(),
            Arc::new(store),
            Arc::new(scheduler),
        );

        let request = ComposeRequest::create("npub1alice", vec![Segment::new("1", "hi")]);
        let outcome = service.compose().save_draft(&request).await.unwrap();

        let entries = service.queue().list("npub1alice", None).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, outcome.post_id);
        assert!(service.database().is_none());
    }

    #[tokio::test]
    async fn test_from_config_opens_database() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default_config();
        config.database.path = temp_dir
            .path()
            .join("posts.db")
            .to_string_lossy()
            .to_string();

        let service = ThreadcastService::from_config(config).await.unwrap();
        assert!(service.database().is_some());

        let mut events = service.subscribe();
        let request = ComposeRequest::create("npub1alice", vec![Segment::new("1", "hi")]);
        let outcome = service.compose().schedule_thread(&request).await.unwrap();
        assert!(outcome.is_complete());

        let mut scheduled = false;
        while let Ok(event) = events.try_recv() {
            if let Event::PostScheduled { post_id } = event {
                scheduled = post_id == outcome.post_id;
            }
        }
        assert!(scheduled);
    }
}
