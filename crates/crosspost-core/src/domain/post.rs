use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::{PublishSummary, aggregate_status};
use super::Target;
use crate::error::RepoError;

/// Aggregate publication status of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            other => Err(RepoError::Query(format!("unknown post status '{other}'"))),
        }
    }
}

/// What gets sent to every destination. Validated and normalized upstream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostContent {
    pub message: String,
    pub media_urls: Vec<String>,
}

/// Post entity - one piece of content with a single publication intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub content: PostContent,
    pub status: PostStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new draft post.
    pub fn new(content: PostContent, scheduled_at: Option<DateTime<Utc>>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content,
            status: PostStatus::Draft,
            scheduled_at,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute status from a complete snapshot of this post's targets.
    ///
    /// `published_at` is stamped the first time the post settles with at
    /// least one destination published and is never moved afterwards.
    pub fn apply_aggregate(&mut self, targets: &[Target], now: DateTime<Utc>) -> PublishSummary {
        let summary = PublishSummary::from_targets(targets);
        let status = aggregate_status(targets.iter().map(|t| t.status));

        if status.is_terminal() && summary.succeeded > 0 && self.published_at.is_none() {
            self.published_at = Some(now);
        }
        if status != self.status {
            self.status = status;
            self.updated_at = now;
        }
        summary
    }

    /// Scheduled, due, and not yet settled.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Scheduled && self.scheduled_at.is_some_and(|at| at <= now)
    }

    /// How late the post is, zero when it is not due yet.
    pub fn overdue_delay(&self, now: DateTime<Utc>) -> Duration {
        self.scheduled_at
            .map(|at| (now - at).max(Duration::zero()))
            .unwrap_or_else(Duration::zero)
    }
}
