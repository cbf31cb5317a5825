//! Creation of posts and their targets.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crosspost_core::domain::{Post, PostContent, PostStatus, Target};
use crosspost_core::error::RepoError;
use crosspost_core::ports::{PostRepository, PublishStore, TargetRepository};

use crate::error::PublisherError;

/// Input for [`PostService::create_post`].
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub content: PostContent,
    pub destination_ids: Vec<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Keep the post out of scheduling even if destinations are attached.
    pub draft: bool,
}

pub struct PostService {
    store: Arc<dyn PublishStore>,
}

impl PostService {
    pub fn new(store: Arc<dyn PublishStore>) -> Self {
        Self { store }
    }

    /// Create a post and one pending target per distinct destination.
    #[tracing::instrument(skip_all, fields(destinations = input.destination_ids.len()))]
    pub async fn create_post(&self, input: NewPost) -> Result<Post, PublisherError> {
        let content = normalize(input.content)?;

        let mut destination_ids: Vec<Uuid> = Vec::with_capacity(input.destination_ids.len());
        for id in input.destination_ids {
            if !destination_ids.contains(&id) {
                destination_ids.push(id);
            }
        }

        let mut post = Post::new(content, input.scheduled_at);
        if !input.draft && !destination_ids.is_empty() {
            post.status = PostStatus::Scheduled;
        }

        let targets = destination_ids
            .into_iter()
            .map(|destination_id| Target::pending(post.id, destination_id))
            .collect();

        let post = self.store.create_post(post, targets).await?;
        tracing::info!(post_id = %post.id, status = %post.status, "Post created");
        Ok(post)
    }

    /// Attach a destination. Attaching the same destination twice returns the
    /// existing target unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn attach_destination(
        &self,
        post_id: Uuid,
        destination_id: Uuid,
    ) -> Result<Target, PublisherError> {
        let post = self.get_post(post_id).await?;
        if let Some(existing) = self.find_target(post_id, destination_id).await? {
            return Ok(existing);
        }
        if post.status == PostStatus::Published {
            return Err(PublisherError::Validation(
                "Cannot attach a destination to a published post".to_string(),
            ));
        }

        let target = match self
            .store
            .insert_target(Target::pending(post_id, destination_id))
            .await
        {
            Ok(target) => target,
            // Lost a race with a concurrent attach of the same pair.
            Err(RepoError::Constraint(msg)) => {
                return self
                    .find_target(post_id, destination_id)
                    .await?
                    .ok_or(PublisherError::Duplicate(msg));
            }
            Err(e) => return Err(e.into()),
        };

        if post.status != PostStatus::Draft {
            self.store.refresh_aggregate(post_id).await?;
        }
        Ok(target)
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Post, PublisherError> {
        self.store
            .find_post(post_id)
            .await?
            .ok_or_else(|| PublisherError::post_not_found(post_id))
    }

    async fn find_target(
        &self,
        post_id: Uuid,
        destination_id: Uuid,
    ) -> Result<Option<Target>, PublisherError> {
        Ok(self
            .store
            .targets_for_post(post_id)
            .await?
            .into_iter()
            .find(|t| t.destination_id == destination_id))
    }
}

fn normalize(content: PostContent) -> Result<PostContent, PublisherError> {
    let message = content.message.trim().to_string();
    let media_urls: Vec<String> = content
        .media_urls
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    if message.is_empty() && media_urls.is_empty() {
        return Err(PublisherError::Validation(
            "Post needs a message or at least one media url".to_string(),
        ));
    }
    Ok(PostContent {
        message,
        media_urls,
    })
}
