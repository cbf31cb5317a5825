//! Overdue endpoints: listing and manual intervention.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use crosspost_shared::ApiResponse;

use super::convert;
use super::posts::detached;
use crate::middleware::error::AppResult;
use crate::state::AppState;

/// GET /api/overdue
pub async fn list_overdue(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let entries: Vec<_> = state
        .scanner
        .list_overdue()
        .await?
        .into_iter()
        .map(convert::overdue)
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::ok(entries)))
}

/// POST /api/overdue/scan
pub async fn scan(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let scanner = state.scanner.clone();
    let report = detached(async move { scanner.run_once().await }).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(convert::scan(report))))
}

/// POST /api/posts/{id}/trigger
pub async fn trigger(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let scanner = state.scanner.clone();
    let post_id = path.into_inner();
    let outcome = detached(async move { scanner.trigger_now(post_id).await }).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(convert::dispatch(outcome))))
}

/// POST /api/posts/{id}/force-fail
pub async fn force_fail(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let report = state.scanner.force_fail(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(convert::force_fail(report))))
}
