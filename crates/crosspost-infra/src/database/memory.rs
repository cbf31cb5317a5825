//! In-memory publish store - used when no database is configured and in tests.
//!
//! All transitions run under one write lock, which makes every claim and the
//! aggregate refresh atomic with respect to each other.
//! Note: Data is lost on process restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crosspost_core::domain::{Lease, Post, PostStatus, Target, TargetOutcome};
use crosspost_core::error::RepoError;
use crosspost_core::ports::{PostRepository, TargetRepository};

#[derive(Default)]
struct State {
    posts: HashMap<Uuid, Post>,
    targets: HashMap<Uuid, Target>,
}

impl State {
    fn targets_of(&self, post_id: Uuid) -> Vec<Target> {
        let mut targets: Vec<Target> = self
            .targets
            .values()
            .filter(|t| t.post_id == post_id)
            .cloned()
            .collect();
        targets.sort_by_key(|t| (t.created_at, t.id));
        targets
    }

    fn has_pair(&self, post_id: Uuid, destination_id: Uuid) -> bool {
        self.targets
            .values()
            .any(|t| t.post_id == post_id && t.destination_id == destination_id)
    }

    fn target_mut(&mut self, id: Uuid) -> Result<&mut Target, RepoError> {
        self.targets.get_mut(&id).ok_or(RepoError::NotFound)
    }
}

/// In-memory store implementing both repository ports.
#[derive(Default)]
pub struct InMemoryPublishStore {
    state: RwLock<State>,
}

impl InMemoryPublishStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a target as-is. Intended for seeding fixtures.
    pub async fn put_target(&self, target: Target) {
        self.state.write().await.targets.insert(target.id, target);
    }

    /// Overwrite a post as-is. Intended for seeding fixtures.
    pub async fn put_post(&self, post: Post) {
        self.state.write().await.posts.insert(post.id, post);
    }
}

#[async_trait]
impl PostRepository for InMemoryPublishStore {
    async fn find_post(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.state.read().await.posts.get(&id).cloned())
    }

    async fn create_post(&self, post: Post, targets: Vec<Target>) -> Result<Post, RepoError> {
        let mut state = self.state.write().await;
        if state.posts.contains_key(&post.id) {
            return Err(RepoError::Constraint("Post already exists".to_string()));
        }
        for (i, target) in targets.iter().enumerate() {
            let repeated = targets[..i]
                .iter()
                .any(|t| t.destination_id == target.destination_id);
            if target.post_id != post.id || repeated {
                return Err(RepoError::Constraint(format!(
                    "Invalid target for destination {}",
                    target.destination_id
                )));
            }
        }

        for target in targets {
            state.targets.insert(target.id, target);
        }
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_schedule(
        &self,
        id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Post, RepoError> {
        let mut state = self.state.write().await;
        let post = state.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.scheduled_at = Some(scheduled_at);
        post.updated_at = Utc::now();
        Ok(post.clone())
    }

    async fn refresh_aggregate(&self, id: Uuid) -> Result<Post, RepoError> {
        let mut state = self.state.write().await;
        let targets = state.targets_of(id);
        let post = state.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.apply_aggregate(&targets, Utc::now());
        Ok(post.clone())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Post>, RepoError> {
        let state = self.state.read().await;
        let mut due: Vec<Post> = state
            .posts
            .values()
            .filter(|p| p.status == PostStatus::Scheduled && p.is_overdue(now))
            .cloned()
            .collect();
        due.sort_by_key(|p| p.scheduled_at);
        Ok(due)
    }
}

#[async_trait]
impl TargetRepository for InMemoryPublishStore {
    async fn targets_for_post(&self, post_id: Uuid) -> Result<Vec<Target>, RepoError> {
        Ok(self.state.read().await.targets_of(post_id))
    }

    async fn insert_target(&self, target: Target) -> Result<Target, RepoError> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&target.post_id) {
            return Err(RepoError::NotFound);
        }
        if state.has_pair(target.post_id, target.destination_id) {
            return Err(RepoError::Constraint(
                "Target already exists for this destination".to_string(),
            ));
        }
        state.targets.insert(target.id, target.clone());
        Ok(target)
    }

    async fn claim(
        &self,
        target_id: Uuid,
        lease: Lease,
        now: DateTime<Utc>,
    ) -> Result<Option<Target>, RepoError> {
        let mut state = self.state.write().await;
        let target = state.target_mut(target_id)?;
        Ok(target.claim(lease, now).then(|| target.clone()))
    }

    async fn begin_attempt(
        &self,
        target_id: Uuid,
        token: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        Ok(state
            .target_mut(target_id)?
            .begin_attempt(token, expires_at, now))
    }

    async fn renew(
        &self,
        target_id: Uuid,
        token: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        Ok(state.target_mut(target_id)?.renew(token, expires_at, now))
    }

    async fn settle(
        &self,
        target_id: Uuid,
        token: Uuid,
        outcome: TargetOutcome,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        Ok(state.target_mut(target_id)?.settle(token, outcome, now))
    }

    async fn release(
        &self,
        target_id: Uuid,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        Ok(state.target_mut(target_id)?.release(token, now))
    }

    async fn force_fail(
        &self,
        target_id: Uuid,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        Ok(state.target_mut(target_id)?.force_fail(message, now))
    }
}
