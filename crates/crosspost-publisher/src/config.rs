//! Orchestrator configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crosspost_core::policy::RetryPolicy;

/// Tuning knobs for [`PublishOrchestrator`](crate::PublishOrchestrator).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on targets dispatched concurrently for one post.
    pub max_parallelism: usize,
    pub retry: RetryPolicy,
    /// How long a claim stays valid without renewal. Renewed before every attempt.
    pub lease_ttl: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 4,
            retry: RetryPolicy::default(),
            lease_ttl: Duration::from_secs(300),
        }
    }
}

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Jitter is a fraction of the delay; anything outside `[0, 1]` is clamped
/// and non-finite input disables it.
fn clamp_jitter(jitter: f64) -> f64 {
    if jitter.is_finite() {
        jitter.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

impl OrchestratorConfig {
    /// Load from `PUBLISH_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retry = RetryPolicy {
            max_retries: var_or("PUBLISH_MAX_RETRIES", defaults.retry.max_retries),
            base_delay: Duration::from_millis(var_or("PUBLISH_BASE_DELAY_MS", 500)),
            max_delay: Duration::from_millis(var_or("PUBLISH_MAX_DELAY_MS", 30_000)),
            jitter: clamp_jitter(var_or("PUBLISH_JITTER", defaults.retry.jitter)),
        };

        Self {
            max_parallelism: var_or("PUBLISH_MAX_PARALLELISM", defaults.max_parallelism).max(1),
            retry,
            lease_ttl: Duration::from_secs(var_or("PUBLISH_LEASE_TTL_SECS", 300)),
        }
    }

    pub(crate) fn lease_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.lease_ttl).unwrap_or_else(|_| chrono::Duration::minutes(5))
    }
}
