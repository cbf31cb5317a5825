//! # Crosspost Infrastructure
//!
//! Concrete implementations of the ports defined in `crosspost-core`:
//! publish stores, destination clients and directories, rate limiting.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory only
//! - `postgres` - PostgreSQL store and destination directory via SeaORM
//! - `rate-limit` - Per-destination rate limiting via governor

pub mod database;
pub mod destinations;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

// Re-exports - In-Memory
pub use database::{DatabaseConfig, InMemoryPublishStore};
pub use destinations::{
    HttpDestinationClient, HttpDestinationConfig, InMemoryDestinationDirectory, PlatformRouter,
};

#[cfg(feature = "postgres")]
pub use database::{DatabaseConnections, PostgresPublishStore};
#[cfg(feature = "postgres")]
pub use destinations::PostgresDestinationDirectory;

#[cfg(feature = "rate-limit")]
pub use rate_limit::{InMemoryRateLimiter, RateLimitConfig};
