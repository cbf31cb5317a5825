//! Domain entities - the core business objects.

mod aggregate;
mod destination;
mod post;
mod target;

pub use aggregate::{PublishSummary, aggregate_status};
pub use destination::DestinationConnection;
pub use post::{Post, PostContent, PostStatus};
pub use target::{Lease, Target, TargetOutcome, TargetStatus};
