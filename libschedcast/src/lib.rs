//! Schedcast - post scheduling and execution engine for social media
//!
//! This library provides the queue, schedule resolution, validation,
//! quota tracking, batch import, and execution engine behind the
//! sched-* command line tools. Actual publishing goes through the
//! adapter capability in [`adapters`].

pub mod adapters;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod import;
pub mod logging;
pub mod quota;
pub mod schedule;
pub mod types;
pub mod validate;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use engine::{Engine, PollReport, RetryPolicy};
pub use error::{Result, SchedcastError};
pub use import::{BatchImporter, ImportReport};
pub use quota::{QuotaDecision, QuotaTracker};
pub use types::{Platform, Post, PostState};
