//! Derivation of a post's status from its targets.
//!
//! This is the only place where post status is decided. Stores call
//! [`Post::apply_aggregate`](super::Post::apply_aggregate) under their
//! per-post lock, the publisher reports [`PublishSummary`] to callers.

use serde::{Deserialize, Serialize};

use super::{PostStatus, Target, TargetStatus};

/// Aggregate status for a set of target statuses.
///
/// - no targets: `Draft`
/// - any target not yet settled: `Scheduled`
/// - every target published: `Published`
/// - otherwise (all settled, at least one failed): `Failed`
pub fn aggregate_status<I>(statuses: I) -> PostStatus
where
    I: IntoIterator<Item = TargetStatus>,
{
    let mut any = false;
    let mut all_published = true;
    for status in statuses {
        any = true;
        match status {
            TargetStatus::Pending | TargetStatus::Dispatching => return PostStatus::Scheduled,
            TargetStatus::Failed => all_published = false,
            TargetStatus::Published => {}
        }
    }

    match (any, all_published) {
        (false, _) => PostStatus::Draft,
        (true, true) => PostStatus::Published,
        (true, false) => PostStatus::Failed,
    }
}

/// Per-post outcome counts returned to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Targets not settled yet (waiting, or owned by another dispatch).
    pub pending: usize,
}

impl PublishSummary {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = TargetStatus>,
    {
        statuses
            .into_iter()
            .fold(Self::default(), |mut summary, status| {
                summary.total += 1;
                match status {
                    TargetStatus::Published => summary.succeeded += 1,
                    TargetStatus::Failed => summary.failed += 1,
                    TargetStatus::Pending | TargetStatus::Dispatching => summary.pending += 1,
                }
                summary
            })
    }

    pub fn from_targets(targets: &[Target]) -> Self {
        Self::from_statuses(targets.iter().map(|t| t.status))
    }

    /// Some destinations succeeded while others failed.
    pub fn is_partial(&self) -> bool {
        self.succeeded > 0 && self.failed > 0
    }

    pub fn is_settled(&self) -> bool {
        self.pending == 0
    }
}
