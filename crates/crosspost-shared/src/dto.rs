//! Data Transfer Objects - request/response types for the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub message: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub destination_ids: Vec<Uuid>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Keep the post as a draft even when destinations are given.
    #[serde(default)]
    pub draft: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachDestinationRequest {
    pub destination_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub message: String,
    pub media_urls: Vec<String>,
    pub status: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One destination of a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetResponse {
    pub destination_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Outcome counts for a post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
    /// Some destinations succeeded while others failed.
    pub partial: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub post_id: Uuid,
    pub status: String,
    pub summary: SummaryResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub post_id: Uuid,
    pub status: String,
    pub targets: Vec<TargetResponse>,
    pub summary: SummaryResponse,
    pub is_settled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverdueEntryResponse {
    pub post_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub delay_seconds: i64,
    pub destinations: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScanReportResponse {
    pub found: usize,
    pub dispatched: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceFailResponse {
    pub failed: usize,
    pub skipped: usize,
    pub status: String,
}
