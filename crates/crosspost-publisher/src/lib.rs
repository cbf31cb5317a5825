//! # Crosspost Publisher
//!
//! Services built on top of the core ports:
//!
//! - [`PublishOrchestrator`] fans one post out to all of its destinations
//! - [`OverdueScanner`] finds scheduled posts that missed their time
//! - [`ProgressReporter`] answers "where is this post at" without side effects
//! - [`PostService`] creates posts and attaches destinations

pub mod config;
pub mod error;
mod orchestrator;
mod overdue;
mod posts;
mod progress;

pub use config::OrchestratorConfig;
pub use error::PublisherError;
pub use orchestrator::{DispatchOutcome, DispatchScope, PublishOrchestrator};
pub use overdue::{ForceFailReport, OverdueEntry, OverdueScanner, ScanReport};
pub use posts::{NewPost, PostService};
pub use progress::{ProgressReporter, ProgressView, TargetProgress};

/// Error message stored on targets abandoned through `force_fail`.
pub const MANUALLY_ABANDONED: &str = "manually abandoned";
