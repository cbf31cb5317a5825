//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod destination;
mod rate_limit;
mod repository;

pub use destination::{DestinationClient, DestinationDirectory, PublishRequest};
pub use rate_limit::{RateLimitError, RateLimitResult, RateLimiter};
pub use repository::{PostRepository, PublishStore, TargetRepository};
