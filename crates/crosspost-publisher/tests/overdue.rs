mod common;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use crosspost_core::domain::{Lease, PostStatus, TargetStatus};
use crosspost_core::error::PublishErrorKind;
use crosspost_core::ports::{PostRepository, TargetRepository};
use crosspost_publisher::{MANUALLY_ABANDONED, OverdueScanner, PublisherError};

use common::{Harness, ScriptedClient};

fn scanner(h: &Harness) -> OverdueScanner {
    OverdueScanner::new(h.store.clone(), h.orchestrator.clone())
}

#[tokio::test]
async fn test_overdue_post_listed_until_triggered() {
    let h = Harness::new(ScriptedClient::new());
    let dest = h.destination().await;
    let post = h
        .scheduled_post(&[dest], Some(Utc::now() - Duration::minutes(10)))
        .await;
    let scanner = scanner(&h);

    let overdue = scanner.list_overdue().await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].post_id, post.id);
    assert_eq!(overdue[0].destinations, vec![dest]);
    assert!(overdue[0].delay >= Duration::minutes(10));
    assert!(overdue[0].delay < Duration::minutes(11));

    let outcome = scanner.trigger_now(post.id).await.unwrap();
    assert_eq!(outcome.status, PostStatus::Published);
    assert!(scanner.list_overdue().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_future_and_draft_posts_are_not_overdue() {
    let h = Harness::new(ScriptedClient::new());
    let dest = h.destination().await;
    h.scheduled_post(&[dest], Some(Utc::now() + Duration::minutes(10)))
        .await;
    h.scheduled_post(&[], Some(Utc::now() - Duration::minutes(10)))
        .await;

    assert!(scanner(&h).list_overdue().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_in_flight_post_is_skipped() {
    let h = Harness::new(ScriptedClient::new());
    let dest = h.destination().await;
    let post = h
        .scheduled_post(&[dest], Some(Utc::now() - Duration::minutes(5)))
        .await;
    let target = h.store.targets_for_post(post.id).await.unwrap().remove(0);
    let now = Utc::now();
    h.store
        .claim(target.id, Lease::new(now + Duration::minutes(5)), now)
        .await
        .unwrap()
        .unwrap();

    let scanner = scanner(&h);
    assert!(scanner.list_overdue().await.unwrap().is_empty());

    let report = scanner.run_once().await.unwrap();
    assert_eq!(report.found, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(h.client.total_calls(), 0);
}

#[tokio::test]
async fn test_run_once_dispatches_every_overdue_post() {
    let h = Harness::new(ScriptedClient::new());
    let dest = h.destination().await;
    for minutes in [3, 30] {
        h.scheduled_post(&[dest], Some(Utc::now() - Duration::minutes(minutes)))
            .await;
    }

    let scanner = scanner(&h);
    let report = scanner.run_once().await.unwrap();

    assert_eq!(report.found, 2);
    assert_eq!(report.dispatched, 2);
    assert_eq!(report.errors, 0);
    assert_eq!(h.client.calls(dest), 2);
    assert!(scanner.list_overdue().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reschedule_validation() {
    let h = Harness::new(ScriptedClient::new());
    let dest = h.destination().await;
    let post = h
        .scheduled_post(&[dest], Some(Utc::now() - Duration::minutes(10)))
        .await;
    let scanner = scanner(&h);

    let err = scanner
        .reschedule(post.id, Utc::now() - Duration::minutes(1))
        .await
        .unwrap_err();
    assert!(matches!(err, PublisherError::Validation(_)));

    let later = Utc::now() + Duration::hours(1);
    let moved = scanner.reschedule(post.id, later).await.unwrap();
    assert_eq!(moved.scheduled_at, Some(later));
    assert_eq!(moved.status, PostStatus::Scheduled);
    assert!(scanner.list_overdue().await.unwrap().is_empty());

    let target = &h.store.targets_for_post(post.id).await.unwrap()[0];
    assert_eq!(target.status, TargetStatus::Pending);

    h.orchestrator.dispatch(post.id).await.unwrap();
    let err = scanner
        .reschedule(post.id, Utc::now() + Duration::hours(2))
        .await
        .unwrap_err();
    assert!(matches!(err, PublisherError::Validation(_)));
}

#[tokio::test]
async fn test_reschedule_moves_draft_with_targets_to_scheduled() {
    let h = Harness::new(ScriptedClient::new());
    let post = h
        .posts
        .create_post(crosspost_publisher::NewPost {
            content: crosspost_core::domain::PostContent {
                message: "teaser".into(),
                media_urls: vec![],
            },
            destination_ids: vec![h.destination().await],
            scheduled_at: None,
            draft: true,
        })
        .await
        .unwrap();
    assert_eq!(post.status, PostStatus::Draft);

    let moved = scanner(&h)
        .reschedule(post.id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(moved.status, PostStatus::Scheduled);
}

#[tokio::test]
async fn test_force_fail_skips_leased_targets() {
    let h = Harness::new(ScriptedClient::new());
    let busy = h.destination().await;
    let idle = h.destination().await;
    let post = h
        .scheduled_post(&[busy, idle], Some(Utc::now() - Duration::minutes(10)))
        .await;
    let targets = h.store.targets_for_post(post.id).await.unwrap();
    let busy_target = targets.iter().find(|t| t.destination_id == busy).unwrap();
    let now = Utc::now();
    h.store
        .claim(busy_target.id, Lease::new(now + Duration::minutes(5)), now)
        .await
        .unwrap()
        .unwrap();

    let report = scanner(&h).force_fail(post.id).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.status, PostStatus::Scheduled);

    let targets = h.store.targets_for_post(post.id).await.unwrap();
    let idle_target = targets.iter().find(|t| t.destination_id == idle).unwrap();
    assert_eq!(idle_target.status, TargetStatus::Failed);
    assert_eq!(idle_target.error_message.as_deref(), Some(MANUALLY_ABANDONED));
    let busy_target = targets.iter().find(|t| t.destination_id == busy).unwrap();
    assert_eq!(busy_target.status, TargetStatus::Dispatching);
}

#[tokio::test]
async fn test_force_fail_settles_post() {
    let h = Harness::new(ScriptedClient::new());
    let dest = h.destination().await;
    let post = h
        .scheduled_post(&[dest], Some(Utc::now() - Duration::minutes(10)))
        .await;

    let report = scanner(&h).force_fail(post.id).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.status, PostStatus::Failed);

    let stored = h.store.find_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Failed);
    assert!(stored.published_at.is_none());
}

#[tokio::test]
async fn test_force_fail_keeps_earlier_failure_cause() {
    let h = Harness::new(ScriptedClient::new());
    let expired = h
        .destination_expiring(Some(Utc::now() - Duration::hours(1)))
        .await;
    let post = h
        .scheduled_post(&[expired], Some(Utc::now() - Duration::minutes(10)))
        .await;
    let outcome = h.orchestrator.dispatch(post.id).await.unwrap();
    assert_eq!(outcome.status, PostStatus::Failed);
    let before = h.store.targets_for_post(post.id).await.unwrap().remove(0);
    assert_eq!(before.error_kind, Some(PublishErrorKind::AuthInvalid));

    let report = scanner(&h).force_fail(post.id).await.unwrap();

    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.status, PostStatus::Failed);
    let after = h.store.targets_for_post(post.id).await.unwrap().remove(0);
    assert_eq!(after.error_kind, Some(PublishErrorKind::AuthInvalid));
    assert_eq!(after.error_message, before.error_message);
    assert_ne!(after.error_message.as_deref(), Some(MANUALLY_ABANDONED));
}

#[tokio::test]
async fn test_scanner_stops_dispatching_after_shutdown() {
    let h = Harness::new(ScriptedClient::new());
    let dest = h.destination().await;
    let post = h
        .scheduled_post(&[dest], Some(Utc::now() - Duration::minutes(10)))
        .await;
    let shutdown = CancellationToken::new();
    let scanner = scanner(&h).with_cancellation(shutdown.child_token());
    shutdown.cancel();

    let err = scanner.trigger_now(post.id).await.unwrap_err();
    assert!(matches!(err, PublisherError::Cancelled(_)));

    let report = scanner.run_once().await.unwrap();
    assert_eq!(report.found, 1);
    assert_eq!(report.dispatched, 0);

    assert_eq!(h.client.total_calls(), 0);
    let target = &h.store.targets_for_post(post.id).await.unwrap()[0];
    assert_eq!(target.status, TargetStatus::Pending);
    assert!(target.lease.is_none());
}
