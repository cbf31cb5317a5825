use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PublishErrorKind, RepoError};

/// Lifecycle of one (post, destination) pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Pending,
    Dispatching,
    Published,
    Failed,
}

impl TargetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Dispatching => "dispatching",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    /// Published or failed. Failed targets can still be retried later.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetStatus {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "dispatching" => Ok(Self::Dispatching),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            other => Err(RepoError::Query(format!("unknown target status '{other}'"))),
        }
    }
}

/// Exclusive ownership of a target by one in-flight dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn new(expires_at: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4(),
            expires_at,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Final result of dispatching one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Published {
        remote_id: String,
    },
    Failed {
        kind: PublishErrorKind,
        message: String,
    },
}

/// Target entity - tracks publication of one post to one destination.
///
/// The transition methods below are the single definition of which state
/// changes are legal. Every store applies them either directly (in memory)
/// or as equivalent conditional updates (SQL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: Uuid,
    pub post_id: Uuid,
    pub destination_id: Uuid,
    pub status: TargetStatus,
    pub remote_id: Option<String>,
    pub error_kind: Option<PublishErrorKind>,
    pub error_message: Option<String>,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub lease: Option<Lease>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Target {
    /// Create a pending target for a newly attached destination.
    pub fn pending(post_id: Uuid, destination_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            post_id,
            destination_id,
            status: TargetStatus::Pending,
            remote_id: None,
            error_kind: None,
            error_message: None,
            attempt_count: 0,
            last_attempt_at: None,
            published_at: None,
            lease: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A remote id is authoritative: once present the destination is done.
    pub fn is_published(&self) -> bool {
        self.status == TargetStatus::Published || self.remote_id.is_some()
    }

    pub fn is_leased(&self, now: DateTime<Utc>) -> bool {
        self.lease.is_some_and(|lease| lease.is_active(now))
    }

    fn holds(&self, token: Uuid, now: DateTime<Utc>) -> bool {
        self.lease
            .is_some_and(|lease| lease.token == token && lease.is_active(now))
    }

    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        !self.is_published() && !self.is_leased(now)
    }

    /// Take ownership and move to `Dispatching`.
    pub fn claim(&mut self, lease: Lease, now: DateTime<Utc>) -> bool {
        if !self.is_claimable(now) {
            return false;
        }
        self.status = TargetStatus::Dispatching;
        self.lease = Some(lease);
        self.updated_at = now;
        true
    }

    /// Record the start of one client invocation and extend the lease.
    pub fn begin_attempt(
        &mut self,
        token: Uuid,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.holds(token, now) || self.is_published() {
            return false;
        }
        self.attempt_count += 1;
        self.last_attempt_at = Some(now);
        self.lease = Some(Lease { token, expires_at });
        self.updated_at = now;
        true
    }

    /// Push the lease held under `token` out to `expires_at`.
    ///
    /// Accepted after the lease lapsed too, as long as no other dispatch has
    /// claimed the row in the meantime (the token still matches).
    pub fn renew(&mut self, token: Uuid, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if self.is_published() || self.lease.is_none_or(|lease| lease.token != token) {
            return false;
        }
        self.lease = Some(Lease { token, expires_at });
        self.updated_at = now;
        true
    }

    /// Write the final outcome and drop the lease.
    ///
    /// A success is accepted even when the lease has lapsed in the meantime,
    /// as long as no other dispatch has taken the row over: the remote publish
    /// already happened and its id must not be lost.
    pub fn settle(&mut self, token: Uuid, outcome: TargetOutcome, now: DateTime<Utc>) -> bool {
        if self.is_published() {
            return false;
        }
        let owned = match (&outcome, self.lease) {
            (TargetOutcome::Published { .. }, Some(lease)) => lease.token == token,
            (TargetOutcome::Failed { .. }, _) => self.holds(token, now),
            (TargetOutcome::Published { .. }, None) => false,
        };
        if !owned {
            return false;
        }
        match outcome {
            TargetOutcome::Published { remote_id } => {
                self.status = TargetStatus::Published;
                self.remote_id = Some(remote_id);
                self.published_at = Some(now);
                self.error_kind = None;
                self.error_message = None;
            }
            TargetOutcome::Failed { kind, message } => {
                self.status = TargetStatus::Failed;
                self.error_kind = Some(kind);
                self.error_message = Some(message);
            }
        }
        self.lease = None;
        self.updated_at = now;
        true
    }

    /// Give the target back as `Pending` without recording a failure.
    pub fn release(&mut self, token: Uuid, now: DateTime<Utc>) -> bool {
        if self.is_published() || self.lease.is_none_or(|lease| lease.token != token) {
            return false;
        }
        self.status = TargetStatus::Pending;
        self.lease = None;
        self.updated_at = now;
        true
    }

    /// Abandon an unowned, unpublished target. Targets that already failed
    /// keep their recorded cause.
    pub fn force_fail(&mut self, message: &str, now: DateTime<Utc>) -> bool {
        if !self.is_claimable(now) || self.status == TargetStatus::Failed {
            return false;
        }
        self.status = TargetStatus::Failed;
        self.error_kind = Some(PublishErrorKind::Rejected);
        self.error_message = Some(message.to_string());
        self.lease = None;
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn leased(target: &mut Target, now: DateTime<Utc>) -> Lease {
        let lease = Lease::new(now + Duration::minutes(5));
        assert!(target.claim(lease, now));
        lease
    }

    #[test]
    fn test_claim_is_exclusive_until_lease_expires() {
        let now = Utc::now();
        let mut target = Target::pending(Uuid::new_v4(), Uuid::new_v4());
        let first = leased(&mut target, now);

        assert_eq!(target.status, TargetStatus::Dispatching);
        assert!(!target.claim(Lease::new(now + Duration::minutes(5)), now));

        let later = first.expires_at + Duration::seconds(1);
        assert!(target.claim(Lease::new(later + Duration::minutes(5)), later));
    }

    #[test]
    fn test_published_target_never_reverts() {
        let now = Utc::now();
        let mut target = Target::pending(Uuid::new_v4(), Uuid::new_v4());
        let lease = leased(&mut target, now);
        assert!(target.settle(
            lease.token,
            TargetOutcome::Published {
                remote_id: "remote-1".into()
            },
            now
        ));

        assert!(!target.claim(Lease::new(now + Duration::minutes(5)), now));
        assert!(!target.release(lease.token, now));
        assert!(!target.force_fail("abandoned", now));
        assert_eq!(target.status, TargetStatus::Published);
        assert_eq!(target.remote_id.as_deref(), Some("remote-1"));
    }

    #[test]
    fn test_begin_attempt_counts_and_requires_token() {
        let now = Utc::now();
        let mut target = Target::pending(Uuid::new_v4(), Uuid::new_v4());
        let lease = leased(&mut target, now);

        assert!(!target.begin_attempt(Uuid::new_v4(), lease.expires_at, now));
        assert!(target.begin_attempt(lease.token, lease.expires_at, now));
        assert!(target.begin_attempt(lease.token, lease.expires_at, now));
        assert_eq!(target.attempt_count, 2);
        assert_eq!(target.last_attempt_at, Some(now));
    }

    #[test]
    fn test_release_returns_to_pending() {
        let now = Utc::now();
        let mut target = Target::pending(Uuid::new_v4(), Uuid::new_v4());
        let lease = leased(&mut target, now);

        assert!(target.release(lease.token, now));
        assert_eq!(target.status, TargetStatus::Pending);
        assert!(target.lease.is_none());
        assert!(target.error_message.is_none());
    }

    #[test]
    fn test_late_success_is_kept_after_lease_lapse() {
        let now = Utc::now();
        let mut target = Target::pending(Uuid::new_v4(), Uuid::new_v4());
        let lease = leased(&mut target, now);
        let late = lease.expires_at + Duration::seconds(30);

        let failed = TargetOutcome::Failed {
            kind: PublishErrorKind::Transient,
            message: "timeout".into(),
        };
        assert!(!target.settle(lease.token, failed, late));
        assert!(target.settle(
            lease.token,
            TargetOutcome::Published {
                remote_id: "late".into()
            },
            late
        ));
    }

    #[test]
    fn test_force_fail_skips_leased_targets() {
        let now = Utc::now();
        let mut target = Target::pending(Uuid::new_v4(), Uuid::new_v4());
        leased(&mut target, now);
        assert!(!target.force_fail("abandoned", now));

        let mut idle = Target::pending(Uuid::new_v4(), Uuid::new_v4());
        assert!(idle.force_fail("abandoned", now));
        assert_eq!(idle.status, TargetStatus::Failed);
        assert_eq!(idle.error_message.as_deref(), Some("abandoned"));
    }

    #[test]
    fn test_force_fail_keeps_recorded_failure() {
        let now = Utc::now();
        let mut target = Target::pending(Uuid::new_v4(), Uuid::new_v4());
        let lease = leased(&mut target, now);
        target.settle(
            lease.token,
            TargetOutcome::Failed {
                kind: PublishErrorKind::AuthInvalid,
                message: "token revoked".into(),
            },
            now,
        );

        assert!(!target.force_fail("abandoned", now));
        assert_eq!(target.error_kind, Some(PublishErrorKind::AuthInvalid));
        assert_eq!(target.error_message.as_deref(), Some("token revoked"));
    }

    #[test]
    fn test_renew_survives_lapse_but_not_takeover() {
        let now = Utc::now();
        let mut target = Target::pending(Uuid::new_v4(), Uuid::new_v4());
        let lease = leased(&mut target, now);
        let lapsed = lease.expires_at + Duration::seconds(30);

        assert!(target.renew(lease.token, lapsed + Duration::minutes(5), lapsed));
        assert!(target.is_leased(lapsed));
        assert!(target.begin_attempt(lease.token, lapsed + Duration::minutes(5), lapsed));

        let much_later = lapsed + Duration::minutes(10);
        let other = Lease::new(much_later + Duration::minutes(5));
        assert!(target.claim(other, much_later));
        assert!(!target.renew(lease.token, much_later + Duration::minutes(5), much_later));
        assert_eq!(target.lease, Some(other));
    }
}
