use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Lease, Post, Target, TargetOutcome};
use crate::error::RepoError;

/// Post storage.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Find a post by its unique ID.
    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError>;

    /// Persist a new post together with its initial targets, atomically.
    async fn create_post(&self, post: Post, targets: Vec<Target>) -> Result<Post, RepoError>;

    /// Move the scheduled time. Targets are left untouched.
    async fn update_schedule(
        &self,
        id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Post, RepoError>;

    /// Recompute and persist the aggregate status from a consistent snapshot
    /// of the post's targets (see `Post::apply_aggregate`).
    async fn refresh_aggregate(&self, id: Uuid) -> Result<Post, RepoError>;

    /// Posts with aggregate `Scheduled` and `scheduled_at <= now`, oldest first.
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Post>, RepoError>;
}

/// Target storage with the claim/lease primitives.
///
/// Every mutating method is a conditional update mirroring the matching
/// transition on [`Target`]; `false`/`None` means the condition did not hold
/// and nothing was written.
#[async_trait]
pub trait TargetRepository: Send + Sync {
    async fn targets_for_post(&self, post_id: Uuid) -> Result<Vec<Target>, RepoError>;

    /// Insert a pending target. Fails with `Constraint` when the
    /// (post, destination) pair already exists.
    async fn insert_target(&self, target: Target) -> Result<Target, RepoError>;

    /// Claim a target for exclusive dispatch. `None` when another dispatch
    /// owns it or it is already published.
    async fn claim(
        &self,
        target_id: Uuid,
        lease: Lease,
        now: DateTime<Utc>,
    ) -> Result<Option<Target>, RepoError>;

    /// Count one attempt and extend the lease held under `token`.
    async fn begin_attempt(
        &self,
        target_id: Uuid,
        token: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError>;

    /// Extend the lease held under `token` without counting an attempt.
    /// Succeeds after a lapse as long as no other dispatch claimed the target.
    async fn renew(
        &self,
        target_id: Uuid,
        token: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError>;

    /// Write the final outcome and release the lease.
    async fn settle(
        &self,
        target_id: Uuid,
        token: Uuid,
        outcome: TargetOutcome,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError>;

    /// Return a claimed target to `Pending` without recording a failure.
    async fn release(
        &self,
        target_id: Uuid,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError>;

    /// Mark an unowned target failed. Published and already failed targets
    /// are left as they are.
    async fn force_fail(
        &self,
        target_id: Uuid,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError>;
}

/// Everything the publisher needs from storage.
pub trait PublishStore: PostRepository + TargetRepository {}

impl<T> PublishStore for T where T: PostRepository + TargetRepository {}
