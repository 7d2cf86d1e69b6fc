//! Threadcast - thread composition and scheduling
//!
//! This library turns a composed thread of content segments into a
//! persisted post, saves it as a draft or hands it to a scheduling trigger,
//! and reports exactly which step failed when something goes wrong.

pub mod composer;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use composer::{derive_submission, ThreadComposer};
pub use config::Config;
pub use db::Database;
pub use error::{ComposeError, ErrorKind, Result, StoreError, ThreadcastError, ValidationError};
pub use service::ThreadcastService;
pub use store::{PostStore, Scheduler};
pub use types::{
    NewPost, NewQueue, Post, PostStatus, PostUpdate, Queue, RawEvent, Segment, SegmentId,
};
