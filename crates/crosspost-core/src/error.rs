//! Domain-level error types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Repository-level errors.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Classification of a failed publish attempt against one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishErrorKind {
    /// Network failure, timeout or a 5xx from the platform.
    Transient,
    /// The platform asked us to slow down.
    RateLimited,
    /// Credentials are missing, expired or revoked. The destination needs
    /// re-authentication before anything can be published to it.
    AuthInvalid,
    /// The platform refused the content (policy, validation, duplicates).
    Rejected,
}

impl PublishErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::RateLimited)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::RateLimited => "rate_limited",
            Self::AuthInvalid => "auth_invalid",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PublishErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishErrorKind {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transient" => Ok(Self::Transient),
            "rate_limited" => Ok(Self::RateLimited),
            "auth_invalid" => Ok(Self::AuthInvalid),
            "rejected" => Ok(Self::Rejected),
            other => Err(RepoError::Query(format!("unknown error kind '{other}'"))),
        }
    }
}

/// Error returned by a destination client for a single publish attempt.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct PublishError {
    pub kind: PublishErrorKind,
    pub message: String,
    /// Minimum wait requested by the platform before the next attempt.
    pub retry_after: Option<Duration>,
}

impl PublishError {
    pub fn new(kind: PublishErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(PublishErrorKind::Transient, message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            kind: PublishErrorKind::RateLimited,
            message: message.into(),
            retry_after,
        }
    }

    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(PublishErrorKind::AuthInvalid, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(PublishErrorKind::Rejected, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(PublishErrorKind::Transient, true)]
    #[test_case(PublishErrorKind::RateLimited, true)]
    #[test_case(PublishErrorKind::AuthInvalid, false)]
    #[test_case(PublishErrorKind::Rejected, false)]
    fn test_retryable_kinds(kind: PublishErrorKind, retryable: bool) {
        assert_eq!(kind.is_retryable(), retryable);
        assert_eq!(kind.as_str().parse::<PublishErrorKind>().unwrap(), kind);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!("exploded".parse::<PublishErrorKind>().is_err());
    }
}
