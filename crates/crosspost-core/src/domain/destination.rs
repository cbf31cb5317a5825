use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Connection details for one external destination (e.g. a page).
///
/// Destinations are owned by an external directory; inside the core they are
/// referenced by id and resolved right before each publish attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationConnection {
    pub destination_id: Uuid,
    /// Platform key used to route to a client implementation.
    pub platform: String,
    /// Identifier of the page/account on the platform side.
    pub external_id: String,
    pub access_token: String,
    pub token_expires_at: Option<DateTime<Utc>>,
}

impl DestinationConnection {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_some_and(|at| at <= now)
    }
}
