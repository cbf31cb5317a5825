//! # Crosspost Core
//!
//! The domain layer of Crosspost: posts, their per-destination targets, the
//! aggregation rule that derives a post's status from its targets, and the
//! retry policy used when a destination call fails.
//! This crate contains pure business logic with zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod policy;
pub mod ports;

pub use error::{PublishError, PublishErrorKind, RepoError};
