//! Destination ports - the external publishing capability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{DestinationConnection, PostContent};
use crate::error::{PublishError, RepoError};

/// One publish call for one (post, destination) pair.
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub post_id: Uuid,
    pub destination: &'a DestinationConnection,
    pub content: &'a PostContent,
}

impl PublishRequest<'_> {
    /// Stable per pair, so platforms that support idempotency keys can dedupe.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.post_id, self.destination.destination_id)
    }
}

/// Destination client trait - performs exactly one external publish attempt.
///
/// Implementations never retry and never persist anything.
#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// Publish the content, returning the platform's id for the new post.
    async fn publish(&self, request: PublishRequest<'_>) -> Result<String, PublishError>;
}

/// Lookup of connection details by destination id.
#[async_trait]
pub trait DestinationDirectory: Send + Sync {
    async fn lookup(&self, destination_id: Uuid)
    -> Result<Option<DestinationConnection>, RepoError>;
}
