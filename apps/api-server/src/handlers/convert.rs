//! Mapping from publisher types to wire DTOs.

use crosspost_core::domain::{Post, PublishSummary, Target};
use crosspost_publisher::{
    DispatchOutcome, ForceFailReport, OverdueEntry, ProgressView, ScanReport, TargetProgress,
};
use crosspost_shared::dto::{
    DispatchResponse, ForceFailResponse, OverdueEntryResponse, PostResponse, ProgressResponse,
    ScanReportResponse, SummaryResponse, TargetResponse,
};

pub fn post(post: Post) -> PostResponse {
    PostResponse {
        id: post.id,
        message: post.content.message,
        media_urls: post.content.media_urls,
        status: post.status.to_string(),
        scheduled_at: post.scheduled_at,
        published_at: post.published_at,
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}

pub fn summary(summary: PublishSummary) -> SummaryResponse {
    SummaryResponse {
        total: summary.total,
        succeeded: summary.succeeded,
        failed: summary.failed,
        pending: summary.pending,
        partial: summary.is_partial(),
    }
}

pub fn dispatch(outcome: DispatchOutcome) -> DispatchResponse {
    DispatchResponse {
        post_id: outcome.post_id,
        status: outcome.status.to_string(),
        summary: summary(outcome.summary),
    }
}

pub fn target(target: Target) -> TargetResponse {
    TargetResponse {
        destination_id: target.destination_id,
        status: target.status.to_string(),
        remote_id: target.remote_id,
        error_kind: target.error_kind.map(|k| k.to_string()),
        error_message: target.error_message,
        attempt_count: target.attempt_count,
        last_attempt_at: target.last_attempt_at,
    }
}

fn target_progress(progress: TargetProgress) -> TargetResponse {
    TargetResponse {
        destination_id: progress.destination_id,
        status: progress.status.to_string(),
        remote_id: progress.remote_id,
        error_kind: progress.error_kind.map(|k| k.to_string()),
        error_message: progress.error_message,
        attempt_count: progress.attempt_count,
        last_attempt_at: progress.last_attempt_at,
    }
}

pub fn progress(view: ProgressView) -> ProgressResponse {
    ProgressResponse {
        post_id: view.post_id,
        status: view.status.to_string(),
        targets: view.targets.into_iter().map(target_progress).collect(),
        summary: summary(view.summary),
        is_settled: view.is_settled,
    }
}

pub fn overdue(entry: OverdueEntry) -> OverdueEntryResponse {
    OverdueEntryResponse {
        post_id: entry.post_id,
        scheduled_at: entry.scheduled_at,
        delay_seconds: entry.delay.num_seconds(),
        destinations: entry.destinations,
    }
}

pub fn scan(report: ScanReport) -> ScanReportResponse {
    ScanReportResponse {
        found: report.found,
        dispatched: report.dispatched,
        skipped: report.skipped,
        errors: report.errors,
    }
}

pub fn force_fail(report: ForceFailReport) -> ForceFailResponse {
    ForceFailResponse {
        failed: report.failed,
        skipped: report.skipped,
        status: report.status.to_string(),
    }
}
