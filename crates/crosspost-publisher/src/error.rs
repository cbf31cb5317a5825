//! Publisher error types.

use thiserror::Error;
use uuid::Uuid;

use crosspost_core::domain::PublishSummary;
use crosspost_core::error::RepoError;

/// Errors surfaced by publisher operations.
///
/// Per-destination failures are never reported here: they are recorded on the
/// target and show up in the returned summary.
#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: &'static str, id: Uuid },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Store error: {0}")]
    Store(#[from] RepoError),

    #[error("Dispatch cancelled ({} of {} targets settled)", .0.succeeded + .0.failed, .0.total)]
    Cancelled(PublishSummary),
}

impl PublisherError {
    pub(crate) fn post_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity_type: "Post",
            id,
        }
    }
}
