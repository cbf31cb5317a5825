use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crosspost_core::domain::{PostStatus, PublishSummary, TargetStatus};
use crosspost_core::error::PublishErrorKind;
use crosspost_core::ports::{PostRepository, PublishStore, TargetRepository};

use crate::error::PublisherError;

/// Snapshot of one destination's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProgress {
    pub destination_id: Uuid,
    pub status: TargetStatus,
    pub error_kind: Option<PublishErrorKind>,
    pub error_message: Option<String>,
    pub remote_id: Option<String>,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Read-only view of a post's publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub post_id: Uuid,
    pub status: PostStatus,
    pub targets: Vec<TargetProgress>,
    pub summary: PublishSummary,
    /// Nothing left to wait for; pollers can stop.
    pub is_settled: bool,
}

pub struct ProgressReporter {
    store: Arc<dyn PublishStore>,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn PublishStore>) -> Self {
        Self { store }
    }

    pub async fn get_progress(&self, post_id: Uuid) -> Result<ProgressView, PublisherError> {
        let post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or_else(|| PublisherError::post_not_found(post_id))?;
        let targets = self.store.targets_for_post(post_id).await?;

        let summary = PublishSummary::from_targets(&targets);
        let targets = targets
            .into_iter()
            .map(|t| TargetProgress {
                destination_id: t.destination_id,
                status: t.status,
                error_kind: t.error_kind,
                error_message: t.error_message,
                remote_id: t.remote_id,
                attempt_count: t.attempt_count,
                last_attempt_at: t.last_attempt_at,
            })
            .collect();

        Ok(ProgressView {
            post_id,
            status: post.status,
            targets,
            summary,
            is_settled: post.status.is_terminal() && summary.is_settled(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crosspost_core::domain::{Lease, Post, PostContent, Target, TargetOutcome};
    use crosspost_infra::InMemoryPublishStore;

    #[tokio::test]
    async fn test_progress_reports_each_target() {
        let store = Arc::new(InMemoryPublishStore::new());
        let post = Post::new(PostContent::default(), None);
        let done = Target::pending(post.id, Uuid::new_v4());
        let waiting = Target::pending(post.id, Uuid::new_v4());
        store
            .create_post(post.clone(), vec![done.clone(), waiting.clone()])
            .await
            .unwrap();

        let now = Utc::now();
        let lease = Lease::new(now + Duration::minutes(1));
        store.claim(done.id, lease, now).await.unwrap();
        store
            .settle(
                done.id,
                lease.token,
                TargetOutcome::Published {
                    remote_id: "r-9".into(),
                },
                now,
            )
            .await
            .unwrap();
        store.refresh_aggregate(post.id).await.unwrap();

        let view = ProgressReporter::new(store).get_progress(post.id).await.unwrap();

        assert_eq!(view.status, PostStatus::Scheduled);
        assert_eq!(view.summary.total, 2);
        assert_eq!(view.summary.succeeded, 1);
        assert_eq!(view.summary.pending, 1);
        assert!(!view.is_settled);
        let published = view
            .targets
            .iter()
            .find(|t| t.destination_id == done.destination_id)
            .unwrap();
        assert_eq!(published.remote_id.as_deref(), Some("r-9"));
    }

    #[tokio::test]
    async fn test_unknown_post_is_not_found() {
        let reporter = ProgressReporter::new(Arc::new(InMemoryPublishStore::new()));
        let err = reporter.get_progress(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PublisherError::NotFound { .. }));
    }
}
