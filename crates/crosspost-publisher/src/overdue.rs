//! Detection of scheduled posts that missed their publication time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crosspost_core::domain::{Post, PostStatus, Target, TargetStatus};
use crosspost_core::ports::{PostRepository, PublishStore, TargetRepository};

use crate::error::PublisherError;
use crate::orchestrator::{DispatchOutcome, DispatchScope, PublishOrchestrator};
use crate::MANUALLY_ABANDONED;

/// A post that should have been published already.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdueEntry {
    pub post_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub delay: Duration,
    /// Destinations still waiting for this post.
    pub destinations: Vec<Uuid>,
}

/// Result of one periodic scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Overdue posts listed.
    pub found: usize,
    /// Posts dispatched without a structural error.
    pub dispatched: usize,
    /// Due posts left alone because a dispatch already owns one of their targets.
    pub skipped: usize,
    pub errors: usize,
}

/// Result of abandoning a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceFailReport {
    pub failed: usize,
    /// Targets under a live lease, left to their owner.
    pub skipped: usize,
    pub status: PostStatus,
}

pub struct OverdueScanner {
    store: Arc<dyn PublishStore>,
    orchestrator: Arc<PublishOrchestrator>,
    cancel: CancellationToken,
}

impl OverdueScanner {
    pub fn new(store: Arc<dyn PublishStore>, orchestrator: Arc<PublishOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
            cancel: CancellationToken::new(),
        }
    }

    /// Dispatches started by the scanner stop, releasing their targets, once
    /// `cancel` fires. Typically a child of the process shutdown token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn dispatch(&self, post_id: Uuid) -> Result<DispatchOutcome, PublisherError> {
        self.orchestrator
            .dispatch_with_cancel(post_id, DispatchScope::All, &self.cancel)
            .await
    }

    /// Overdue posts as of now, oldest first.
    pub async fn list_overdue(&self) -> Result<Vec<OverdueEntry>, PublisherError> {
        Ok(self.scan(Utc::now()).await?.0)
    }

    /// Due posts split into listable entries and the count of in-flight ones.
    async fn scan(&self, now: DateTime<Utc>) -> Result<(Vec<OverdueEntry>, usize), PublisherError> {
        let mut entries = Vec::new();
        let mut in_flight = 0;

        for post in self.store.find_due(now).await? {
            let targets = self.store.targets_for_post(post.id).await?;
            if targets.iter().any(|t| t.is_leased(now)) {
                in_flight += 1;
                continue;
            }
            let Some(scheduled_at) = post.scheduled_at else {
                continue;
            };
            entries.push(OverdueEntry {
                post_id: post.id,
                scheduled_at,
                delay: post.overdue_delay(now),
                destinations: waiting_destinations(&targets),
            });
        }

        Ok((entries, in_flight))
    }

    /// Dispatch the post right away, whatever its schedule.
    pub async fn trigger_now(&self, post_id: Uuid) -> Result<DispatchOutcome, PublisherError> {
        tracing::info!(post_id = %post_id, "Manual trigger");
        self.dispatch(post_id).await
    }

    /// Move the publication time. Targets are not touched.
    #[tracing::instrument(skip(self))]
    pub async fn reschedule(
        &self,
        post_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Post, PublisherError> {
        let post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or_else(|| PublisherError::post_not_found(post_id))?;

        if post.status == PostStatus::Published {
            return Err(PublisherError::Validation(
                "Post is already published".to_string(),
            ));
        }
        if scheduled_at <= Utc::now() {
            return Err(PublisherError::Validation(
                "New schedule must be in the future".to_string(),
            ));
        }

        self.store.update_schedule(post_id, scheduled_at).await?;
        let post = self.store.refresh_aggregate(post_id).await?;
        tracing::info!(status = %post.status, "Post rescheduled");
        Ok(post)
    }

    /// Give up on every unpublished target that nobody is working on.
    #[tracing::instrument(skip(self))]
    pub async fn force_fail(&self, post_id: Uuid) -> Result<ForceFailReport, PublisherError> {
        if self.store.find_post(post_id).await?.is_none() {
            return Err(PublisherError::post_not_found(post_id));
        }

        let mut failed = 0;
        let mut skipped = 0;
        for target in self.store.targets_for_post(post_id).await? {
            // Already failed targets keep their recorded cause.
            if target.is_published() || target.status == TargetStatus::Failed {
                continue;
            }
            if self
                .store
                .force_fail(target.id, MANUALLY_ABANDONED, Utc::now())
                .await?
            {
                failed += 1;
            } else {
                skipped += 1;
            }
        }

        let post = self.store.refresh_aggregate(post_id).await?;
        tracing::info!(failed, skipped, status = %post.status, "Post force-failed");
        Ok(ForceFailReport {
            failed,
            skipped,
            status: post.status,
        })
    }

    /// Periodic entry point: dispatch every overdue post once.
    pub async fn run_once(&self) -> Result<ScanReport, PublisherError> {
        let (entries, in_flight) = self.scan(Utc::now()).await?;
        let mut report = ScanReport {
            found: entries.len(),
            skipped: in_flight,
            ..ScanReport::default()
        };

        for entry in entries {
            if self.cancel.is_cancelled() {
                tracing::info!("Overdue scan interrupted by shutdown");
                break;
            }
            tracing::info!(
                post_id = %entry.post_id,
                delay_secs = entry.delay.num_seconds(),
                "Dispatching overdue post"
            );
            match self.dispatch(entry.post_id).await {
                Ok(_) => report.dispatched += 1,
                Err(e) => {
                    tracing::error!(post_id = %entry.post_id, error = %e, "Overdue dispatch failed");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }
}

fn waiting_destinations(targets: &[Target]) -> Vec<Uuid> {
    targets
        .iter()
        .filter(|t| !t.is_published())
        .map(|t| t.destination_id)
        .collect()
}
