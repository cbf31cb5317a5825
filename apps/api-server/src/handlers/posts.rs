//! Post endpoints: creation, dispatch and progress.

use std::future::Future;

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use crosspost_core::domain::PostContent;
use crosspost_publisher::{DispatchOutcome, DispatchScope, NewPost, PublisherError};
use crosspost_shared::ApiResponse;
use crosspost_shared::dto::{AttachDestinationRequest, CreatePostRequest, RescheduleRequest};

use super::convert;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// Run `task` on its own task so a dropped request cannot stop it half-way.
pub(super) async fn detached<F, T>(task: F) -> AppResult<T>
where
    F: Future<Output = Result<T, PublisherError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(task)
        .await
        .map_err(|e| AppError::Internal(format!("Dispatch task failed: {e}")))?
        .map_err(AppError::from)
}

/// Dispatch under a token that fires when the request goes away or the
/// server shuts down; claimed targets then go back to `Pending`.
async fn dispatch_scoped(
    state: &AppState,
    post_id: Uuid,
    scope: DispatchScope,
) -> AppResult<DispatchOutcome> {
    let cancel = state.shutdown.child_token();
    let guard = cancel.clone().drop_guard();
    let orchestrator = state.orchestrator.clone();

    let outcome = detached(async move {
        orchestrator
            .dispatch_with_cancel(post_id, scope, &cancel)
            .await
    })
    .await;

    guard.disarm();
    outcome
}

/// POST /api/posts
pub async fn create_post(
    state: web::Data<AppState>,
    body: web::Json<CreatePostRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let post = state
        .posts
        .create_post(NewPost {
            content: PostContent {
                message: req.message,
                media_urls: req.media_urls,
            },
            destination_ids: req.destination_ids,
            scheduled_at: req.scheduled_at,
            draft: req.draft,
        })
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::ok(convert::post(post))))
}

/// GET /api/posts/{id}
pub async fn get_post(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let post = state.posts.get_post(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(convert::post(post))))
}

/// POST /api/posts/{id}/destinations
pub async fn attach_destination(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<AttachDestinationRequest>,
) -> AppResult<HttpResponse> {
    let target = state
        .posts
        .attach_destination(path.into_inner(), body.destination_id)
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(convert::target(target))))
}

/// POST /api/posts/{id}/dispatch
pub async fn dispatch(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let outcome = dispatch_scoped(&state, path.into_inner(), DispatchScope::All).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(convert::dispatch(outcome))))
}

/// POST /api/posts/{id}/retry-failed
pub async fn retry_failed(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let outcome = dispatch_scoped(&state, path.into_inner(), DispatchScope::FailedOnly).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(convert::dispatch(outcome))))
}

/// GET /api/posts/{id}/progress
pub async fn progress(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let view = state.progress.get_progress(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(convert::progress(view))))
}

/// POST /api/posts/{id}/reschedule
pub async fn reschedule(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<RescheduleRequest>,
) -> AppResult<HttpResponse> {
    let post = state
        .scanner
        .reschedule(path.into_inner(), body.scheduled_at)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(convert::post(post))))
}
