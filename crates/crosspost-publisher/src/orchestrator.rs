//! Fan-out of one post to all of its destinations.
//!
//! Every eligible target runs in its own spawned slot, at most
//! `max_parallelism` at a time. A slot claims its target, then loops over
//! attempts until the target settles, the lease is lost, or the dispatch is
//! cancelled. The post aggregate is recomputed once all slots are done.
//!
//! Slots outlive the dispatch future: if the caller drops it, the slots are
//! cancelled and give their targets back as `Pending`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crosspost_core::domain::{
    DestinationConnection, Lease, PostContent, PostStatus, PublishSummary, Target, TargetOutcome,
    TargetStatus,
};
use crosspost_core::error::{PublishError, RepoError};
use crosspost_core::policy::RetryDecision;
use crosspost_core::ports::{
    DestinationClient, DestinationDirectory, PostRepository, PublishRequest, PublishStore,
    RateLimiter, TargetRepository,
};

use crate::config::OrchestratorConfig;
use crate::error::PublisherError;

/// Which targets a dispatch picks up. Published targets are never included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchScope {
    /// Every target that is not published yet.
    All,
    /// Only targets currently `Failed`.
    FailedOnly,
}

impl DispatchScope {
    fn includes(self, target: &Target) -> bool {
        if target.is_published() {
            return false;
        }
        match self {
            Self::All => true,
            Self::FailedOnly => target.status == TargetStatus::Failed,
        }
    }
}

/// Result of one dispatch invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub post_id: Uuid,
    /// Aggregate status after this invocation.
    pub status: PostStatus,
    pub summary: PublishSummary,
}

/// How one target slot ended.
#[derive(Debug)]
enum SlotEnd {
    Settled,
    /// Another dispatch owns the target, or took it over mid-way.
    Conflict,
    Cancelled,
    Store(RepoError),
}

/// How a wait between attempts ended.
enum Pause {
    Elapsed,
    Cancelled,
    LeaseLost,
}

#[derive(Clone)]
pub struct PublishOrchestrator {
    store: Arc<dyn PublishStore>,
    directory: Arc<dyn DestinationDirectory>,
    client: Arc<dyn DestinationClient>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    config: OrchestratorConfig,
}

impl PublishOrchestrator {
    pub fn new(
        store: Arc<dyn PublishStore>,
        directory: Arc<dyn DestinationDirectory>,
        client: Arc<dyn DestinationClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            directory,
            client,
            rate_limiter: None,
            config,
        }
    }

    /// Throttle every attempt through `limiter`, keyed by destination id.
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Publish every target of the post that is not published yet.
    pub async fn dispatch(&self, post_id: Uuid) -> Result<DispatchOutcome, PublisherError> {
        self.dispatch_with_cancel(post_id, DispatchScope::All, &CancellationToken::new())
            .await
    }

    /// Retry only the targets that previously failed.
    pub async fn retry_failed(&self, post_id: Uuid) -> Result<DispatchOutcome, PublisherError> {
        self.dispatch_with_cancel(post_id, DispatchScope::FailedOnly, &CancellationToken::new())
            .await
    }

    /// Dispatch `scope` of the post's targets until settled or `cancel` fires.
    ///
    /// On cancellation every target this call still owns goes back to
    /// `Pending`, the aggregate is recomputed and `Cancelled` is returned with
    /// the counts at that point.
    #[tracing::instrument(skip_all, fields(post_id = %post_id, ?scope))]
    pub async fn dispatch_with_cancel(
        &self,
        post_id: Uuid,
        scope: DispatchScope,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, PublisherError> {
        let post = self
            .store
            .find_post(post_id)
            .await?
            .ok_or_else(|| PublisherError::post_not_found(post_id))?;

        let eligible: Vec<Target> = self
            .store
            .targets_for_post(post_id)
            .await?
            .into_iter()
            .filter(|t| scope.includes(t))
            .collect();

        tracing::info!(eligible = eligible.len(), "Dispatching post");

        let content = Arc::new(post.content);
        let slots = cancel.child_token();
        // Fires if this future is dropped before the slots finish.
        let _abandon = slots.clone().drop_guard();

        let ends: Vec<SlotEnd> = stream::iter(eligible)
            .map(|target| {
                let span = tracing::info_span!(
                    "target",
                    target_id = %target.id,
                    destination_id = %target.destination_id
                );
                let this = self.clone();
                let content = Arc::clone(&content);
                let cancel = slots.clone();
                tokio::spawn(
                    async move { this.run_slot(&content, target, &cancel).await }.instrument(span),
                )
            })
            .buffer_unordered(self.config.max_parallelism.max(1))
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    tracing::error!(error = %e, "Target slot aborted, lease left to expire");
                    SlotEnd::Conflict
                })
            })
            .collect()
            .await;

        let mut cancelled = false;
        let mut store_error = None;
        for end in ends {
            match end {
                SlotEnd::Settled | SlotEnd::Conflict => {}
                SlotEnd::Cancelled => cancelled = true,
                SlotEnd::Store(e) => store_error = store_error.or(Some(e)),
            }
        }

        let post = self.store.refresh_aggregate(post_id).await?;
        let summary = PublishSummary::from_targets(&self.store.targets_for_post(post_id).await?);

        if let Some(e) = store_error {
            tracing::error!(error = %e, "Store failed during dispatch");
            return Err(e.into());
        }
        if cancelled {
            tracing::info!(?summary, "Dispatch cancelled");
            return Err(PublisherError::Cancelled(summary));
        }

        tracing::info!(
            status = %post.status,
            succeeded = summary.succeeded,
            failed = summary.failed,
            pending = summary.pending,
            "Dispatch finished"
        );
        Ok(DispatchOutcome {
            post_id,
            status: post.status,
            summary,
        })
    }

    async fn run_slot(
        &self,
        content: &PostContent,
        target: Target,
        cancel: &CancellationToken,
    ) -> SlotEnd {
        match self.drive_target(content, &target, cancel).await {
            Ok(end) => end,
            Err(e) => SlotEnd::Store(e),
        }
    }

    /// Claim one target and attempt it until it settles.
    async fn drive_target(
        &self,
        content: &PostContent,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<SlotEnd, RepoError> {
        if cancel.is_cancelled() {
            return Ok(SlotEnd::Cancelled);
        }

        let ttl = self.config.lease_ttl();
        let now = Utc::now();
        let lease = Lease::new(now + ttl);
        if self.store.claim(target.id, lease, now).await?.is_none() {
            tracing::debug!("Target owned by another dispatch");
            return Ok(SlotEnd::Conflict);
        }

        let mut attempt = 0u32;
        loop {
            match self.wait_for_throttle(target, lease, cancel).await? {
                Pause::Elapsed => {}
                Pause::Cancelled => return self.release(target, lease).await,
                Pause::LeaseLost => {
                    tracing::warn!("Lease lost while throttled");
                    return Ok(SlotEnd::Conflict);
                }
            }

            let now = Utc::now();
            if !self
                .store
                .begin_attempt(target.id, lease.token, now + ttl, now)
                .await?
            {
                tracing::warn!("Lease lost before attempt");
                return Ok(SlotEnd::Conflict);
            }
            attempt += 1;

            // An attempt in flight is always allowed to finish, a remote
            // publish cannot be taken back.
            let result = match self.resolve(target.destination_id).await {
                Ok(destination) => {
                    self.client
                        .publish(PublishRequest {
                            post_id: target.post_id,
                            destination: &destination,
                            content,
                        })
                        .await
                }
                Err(e) => Err(e),
            };

            let err = match result {
                Ok(remote_id) => return self.settle_published(target, lease, remote_id, attempt).await,
                Err(err) => err,
            };

            if cancel.is_cancelled() {
                return self.release(target, lease).await;
            }

            match self.config.retry.decide(attempt, &err) {
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(attempt, kind = %err.kind, ?delay, "Attempt failed, retrying");
                    match self.pause(target, lease, delay, cancel).await? {
                        Pause::Elapsed => {}
                        Pause::Cancelled => return self.release(target, lease).await,
                        Pause::LeaseLost => {
                            tracing::warn!("Lease lost during backoff");
                            return Ok(SlotEnd::Conflict);
                        }
                    }
                }
                RetryDecision::GiveUp => return self.settle_failed(target, lease, err, attempt).await,
            }
        }
    }

    /// Wait until the limiter lets this destination through.
    async fn wait_for_throttle(
        &self,
        target: &Target,
        lease: Lease,
        cancel: &CancellationToken,
    ) -> Result<Pause, RepoError> {
        let Some(limiter) = &self.rate_limiter else {
            return Ok(if cancel.is_cancelled() {
                Pause::Cancelled
            } else {
                Pause::Elapsed
            });
        };
        let key = target.destination_id.to_string();

        loop {
            if cancel.is_cancelled() {
                return Ok(Pause::Cancelled);
            }
            let wait = match limiter.check(&key).await {
                Ok(result) if result.allowed => return Ok(Pause::Elapsed),
                Ok(result) => result.reset_after,
                Err(e) => {
                    tracing::warn!(error = %e, "Rate limiter unavailable, proceeding");
                    return Ok(Pause::Elapsed);
                }
            };
            tracing::debug!(?wait, "Throttled");
            match self.pause(target, lease, wait, cancel).await? {
                Pause::Elapsed => {}
                other => return Ok(other),
            }
        }
    }

    /// Sleep for `wait` while keeping the target owned: the lease is pushed
    /// past the end of the wait before sleeping.
    async fn pause(
        &self,
        target: &Target,
        lease: Lease,
        wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<Pause, RepoError> {
        let now = Utc::now();
        if !self
            .store
            .renew(target.id, lease.token, self.held_until(now, wait), now)
            .await?
        {
            return Ok(Pause::LeaseLost);
        }

        tokio::select! {
            _ = cancel.cancelled() => Ok(Pause::Cancelled),
            _ = tokio::time::sleep(wait) => Ok(Pause::Elapsed),
        }
    }

    fn held_until(&self, now: DateTime<Utc>, wait: Duration) -> DateTime<Utc> {
        let wait = chrono::Duration::from_std(wait).unwrap_or_else(|_| chrono::Duration::days(1));
        now + wait + self.config.lease_ttl()
    }

    /// Look up live credentials. Anything unusable counts as an auth failure
    /// and never reaches the platform.
    async fn resolve(&self, destination_id: Uuid) -> Result<DestinationConnection, PublishError> {
        match self.directory.lookup(destination_id).await {
            Ok(Some(conn)) if conn.is_expired(Utc::now()) => {
                Err(PublishError::auth_invalid("Access token expired"))
            }
            Ok(Some(conn)) => Ok(conn),
            Ok(None) => Err(PublishError::auth_invalid("Unknown destination")),
            Err(e) => Err(PublishError::transient(format!("Directory lookup failed: {e}"))),
        }
    }

    async fn settle_published(
        &self,
        target: &Target,
        lease: Lease,
        remote_id: String,
        attempt: u32,
    ) -> Result<SlotEnd, RepoError> {
        let outcome = TargetOutcome::Published {
            remote_id: remote_id.clone(),
        };
        if self
            .store
            .settle(target.id, lease.token, outcome, Utc::now())
            .await?
        {
            tracing::info!(attempt, remote_id = %remote_id, "Target published");
            Ok(SlotEnd::Settled)
        } else {
            tracing::error!(remote_id = %remote_id, "Published remotely but the target was taken over");
            Ok(SlotEnd::Conflict)
        }
    }

    async fn settle_failed(
        &self,
        target: &Target,
        lease: Lease,
        err: PublishError,
        attempt: u32,
    ) -> Result<SlotEnd, RepoError> {
        tracing::warn!(attempt, kind = %err.kind, error = %err.message, "Target failed");
        let outcome = TargetOutcome::Failed {
            kind: err.kind,
            message: err.message,
        };
        if self
            .store
            .settle(target.id, lease.token, outcome, Utc::now())
            .await?
        {
            Ok(SlotEnd::Settled)
        } else {
            Ok(SlotEnd::Conflict)
        }
    }

    async fn release(&self, target: &Target, lease: Lease) -> Result<SlotEnd, RepoError> {
        if !self
            .store
            .release(target.id, lease.token, Utc::now())
            .await?
        {
            tracing::debug!("Lease already gone on release");
        }
        Ok(SlotEnd::Cancelled)
    }
}
