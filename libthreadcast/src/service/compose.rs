//! Composition orchestrator
//!
//! Turns composed segments into a persisted post and, for scheduling
//! requests, invokes the scheduling trigger on the result.
//!
//! # Steps
//!
//! 1. Derive the raw event list from the segments. An empty list fails with
//!    `ValidationError::EmptyThread` before any remote call.
//! 2. Without an edit reference an account is required
//!    (`ValidationError::NoAccount`), falling back to `[defaults] account`.
//! 3. Persist: `update` the edited post or `create` a new one. Exactly one
//!    write per invocation; failures surface as `ComposeError::Persist`.
//! 4. Schedule (only `schedule_thread`): call the trigger with the persisted
//!    id. Persist and schedule are not atomic. If the trigger fails the post
//!    stays persisted as an unscheduled non-draft and the error is
//!    `ComposeError::Schedule` carrying the id, so the caller can use
//!    `retry_schedule` without writing the post again.
//!
//! No step is retried automatically. Callers must not run two operations
//! concurrently for the same editing context: both would `update` the same
//! record and the last write wins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::events::{ComposeMode, Event, EventBus};
use super::validation::ValidationService;
use crate::composer::{derive_submission, ThreadComposer};
use crate::error::{ComposeError, ErrorKind, ValidationError};
use crate::store::{PostStore, Scheduler};
use crate::types::{NewPost, Post, PostUpdate, RawEvent, Segment};
use crate::Config;

/// Explicit inputs of a save or schedule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeRequest {
    /// Existing post to update; `None` creates a new post
    pub edit_ref: Option<String>,
    /// Owning account, required when creating
    pub account_ref: Option<String>,
    /// Post being quoted; only honored when creating
    pub quote_ref: Option<String>,
    pub segments: Vec<Segment>,
}

impl ComposeRequest {
    /// Request that creates a new post for `account_ref`
    pub fn create(account_ref: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            account_ref: Some(account_ref.into()),
            segments,
            ..Default::default()
        }
    }

    /// Request that updates the post `edit_ref`
    pub fn edit(edit_ref: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            edit_ref: Some(edit_ref.into()),
            segments,
            ..Default::default()
        }
    }

    pub fn with_quote(mut self, quote_ref: impl Into<String>) -> Self {
        self.quote_ref = Some(quote_ref.into());
        self
    }

    /// The quoted post, if one was given and is not blank
    pub fn quote(&self) -> Option<&str> {
        non_blank(self.quote_ref.as_deref())
    }
}

/// What a successful composition did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposeAction {
    DraftSaved,
    DraftUpdated,
    Scheduled,
}

impl ComposeAction {
    pub fn message(&self) -> &'static str {
        match self {
            ComposeAction::DraftSaved => "Draft saved",
            ComposeAction::DraftUpdated => "Draft updated",
            ComposeAction::Scheduled => "Thread scheduled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeOutcome {
    pub post_id: String,
    pub action: ComposeAction,
    pub message: String,
}

impl ComposeOutcome {
    fn new(post_id: String, action: ComposeAction) -> Self {
        Self {
            post_id,
            action,
            message: action.message().to_string(),
        }
    }

    /// True once the thread is scheduled and the workflow is finished
    pub fn is_complete(&self) -> bool {
        self.action == ComposeAction::Scheduled
    }
}

/// Tagged result handed to presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComposeReport {
    Ok {
        post_id: String,
        message: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        post_id: Option<String>,
    },
}

impl ComposeReport {
    pub fn from_result(result: &Result<ComposeOutcome, ComposeError>) -> Self {
        match result {
            Ok(outcome) => ComposeReport::Ok {
                post_id: outcome.post_id.clone(),
                message: outcome.message.clone(),
            },
            Err(e) => ComposeReport::Error {
                kind: e.kind(),
                message: e.to_string(),
                post_id: e.post_id().map(str::to_string),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ComposeReport::Ok { .. })
    }
}

/// A persisted post loaded back into composer state
#[derive(Debug)]
pub struct EditSession {
    pub post: Post,
    pub composer: ThreadComposer,
}

impl EditSession {
    /// Request that writes the current composer state back to the post
    pub fn request(&self) -> ComposeRequest {
        ComposeRequest::edit(self.post.id.clone(), self.composer.segments().to_vec())
    }
}

enum Target<'a> {
    Update(&'a str),
    Create { account_ref: String },
}

impl Target<'_> {
    fn mode(&self) -> ComposeMode {
        match self {
            Target::Update(_) => ComposeMode::Update,
            Target::Create { .. } => ComposeMode::Create,
        }
    }
}

/// Composition orchestrator
///
/// Stateless apart from its collaborators; every call takes its inputs
/// explicitly through `ComposeRequest`.
#[derive(Clone)]
pub struct ComposeService {
    store: Arc<dyn PostStore>,
    scheduler: Arc<dyn Scheduler>,
    validation: ValidationService,
    config: Arc<Config>,
    event_bus: EventBus,
}

impl ComposeService {
    pub fn new(
        store: Arc<dyn PostStore>,
        scheduler: Arc<dyn Scheduler>,
        config: Arc<Config>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            scheduler,
            validation: ValidationService::new(Arc::clone(&config)),
            config,
            event_bus,
        }
    }

    /// Save the thread as a draft
    ///
    /// Updates `edit_ref` when present, otherwise creates a new draft. Never
    /// schedules.
    ///
    /// # Errors
    ///
    /// `ComposeError::Validation` with no remote call, or
    /// `ComposeError::Persist` wrapping the store's error unchanged.
    pub async fn save_draft(
        &self,
        request: &ComposeRequest,
    ) -> Result<ComposeOutcome, ComposeError> {
        let result = self.run_save_draft(request).await;
        self.report_failure(&result);
        result
    }

    /// Persist the thread as a non-draft and schedule it
    ///
    /// # Errors
    ///
    /// `ComposeError::Validation` with no remote call,
    /// `ComposeError::Persist` if the write failed (nothing scheduled), or
    /// `ComposeError::Schedule` if the post was written but the trigger
    /// failed. The latter carries the post id for `retry_schedule`.
    pub async fn schedule_thread(
        &self,
        request: &ComposeRequest,
    ) -> Result<ComposeOutcome, ComposeError> {
        let result = self.run_schedule_thread(request).await;
        self.report_failure(&result);
        result
    }

    /// Re-issue only the scheduling trigger for an already persisted post
    ///
    /// Relies on the trigger being idempotent per post id.
    pub async fn retry_schedule(&self, post_id: &str) -> Result<ComposeOutcome, ComposeError> {
        let result = self.trigger(post_id.to_string()).await;
        self.report_failure(&result);
        result
    }

    /// Fetch a post and rebuild composer state for editing it
    ///
    /// Segment ids are freshly issued; only the order of the stored raw
    /// events carries over.
    pub async fn load_for_edit(&self, post_id: &str) -> crate::Result<EditSession> {
        let post = self.store.get(post_id).await?;
        let composer = ThreadComposer::from_post(&post);
        debug!(
            post_id,
            segments = composer.len(),
            "Loaded post for editing"
        );
        Ok(EditSession { post, composer })
    }

    async fn run_save_draft(
        &self,
        request: &ComposeRequest,
    ) -> Result<ComposeOutcome, ComposeError> {
        let (raw_events, target) = self.prepare(request)?;
        let post = self.persist(&target, raw_events, true, request).await?;

        let action = match target {
            Target::Update(_) => ComposeAction::DraftUpdated,
            Target::Create { .. } => ComposeAction::DraftSaved,
        };
        info!(post_id = %post.id, "{}", action.message());
        Ok(ComposeOutcome::new(post.id, action))
    }

    async fn run_schedule_thread(
        &self,
        request: &ComposeRequest,
    ) -> Result<ComposeOutcome, ComposeError> {
        let (raw_events, target) = self.prepare(request)?;
        let post = self.persist(&target, raw_events, false, request).await?;

        let post_id = match target {
            Target::Update(edit_ref) => edit_ref.to_string(),
            Target::Create { .. } => post.id,
        };
        self.trigger(post_id).await
    }

    /// Local validation; nothing here touches the store
    fn prepare<'a>(
        &self,
        request: &'a ComposeRequest,
    ) -> Result<(Vec<RawEvent>, Target<'a>), ValidationError> {
        let raw_events = derive_submission(&request.segments);
        debug!(
            segments = request.segments.len(),
            raw_events = raw_events.len(),
            "Derived submission"
        );
        if raw_events.is_empty() {
            return Err(ValidationError::EmptyThread);
        }

        let target = match non_blank(request.edit_ref.as_deref()) {
            Some(edit_ref) => Target::Update(edit_ref),
            None => Target::Create {
                account_ref: self.resolve_account(request)?,
            },
        };

        self.validation.check_limits(&raw_events)?;
        Ok((raw_events, target))
    }

    fn resolve_account(&self, request: &ComposeRequest) -> Result<String, ValidationError> {
        non_blank(request.account_ref.as_deref())
            .or_else(|| non_blank(self.config.defaults.account.as_deref()))
            .map(str::to_string)
            .ok_or(ValidationError::NoAccount)
    }

    /// The single write of an invocation
    async fn persist(
        &self,
        target: &Target<'_>,
        raw_events: Vec<RawEvent>,
        draft: bool,
        request: &ComposeRequest,
    ) -> Result<Post, ComposeError> {
        self.event_bus.emit(Event::ComposeStarted {
            mode: target.mode(),
            edit_ref: match target {
                Target::Update(edit_ref) => Some(edit_ref.to_string()),
                Target::Create { .. } => None,
            },
            segments: raw_events.len(),
        });

        let written = match target {
            Target::Update(edit_ref) => {
                if request.quote().is_some() {
                    warn!(
                        post_id = %edit_ref,
                        "Ignoring quote reference when editing an existing post"
                    );
                }
                self.store
                    .update(edit_ref, PostUpdate::new(raw_events, draft))
                    .await
            }
            Target::Create { account_ref } => {
                let new_post = NewPost::new(account_ref.clone(), raw_events)
                    .with_draft(draft)
                    .with_quote(request.quote().map(str::to_string));
                self.store.create(new_post).await
            }
        };

        let post = written.map_err(|source| ComposeError::Persist { source })?;
        self.event_bus.emit(Event::PostPersisted {
            post_id: post.id.clone(),
            draft,
        });
        Ok(post)
    }

    async fn trigger(&self, post_id: String) -> Result<ComposeOutcome, ComposeError> {
        match self.scheduler.schedule(&post_id).await {
            Ok(()) => {
                info!(post_id = %post_id, "Thread scheduled");
                self.event_bus.emit(Event::PostScheduled {
                    post_id: post_id.clone(),
                });
                Ok(ComposeOutcome::new(post_id, ComposeAction::Scheduled))
            }
            Err(source) => Err(ComposeError::Schedule { post_id, source }),
        }
    }

    fn report_failure(&self, result: &Result<ComposeOutcome, ComposeError>) {
        if let Err(e) = result {
            warn!(kind = %e.kind(), post_id = ?e.post_id(), "{}", e);
            self.event_bus.emit(Event::ComposeFailed {
                kind: e.kind(),
                post_id: e.post_id().map(str::to_string),
                error: e.to_string(),
            });
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
