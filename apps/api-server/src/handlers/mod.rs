//! HTTP handlers and route configuration.

mod convert;
mod health;
mod overdue;
mod posts;

use actix_web::web;

use crate::middleware::error::AppError;

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            // Posts
            .service(
                web::scope("/posts")
                    .route("", web::post().to(posts::create_post))
                    .route("/{id}", web::get().to(posts::get_post))
                    .route("/{id}/destinations", web::post().to(posts::attach_destination))
                    .route("/{id}/dispatch", web::post().to(posts::dispatch))
                    .route("/{id}/retry-failed", web::post().to(posts::retry_failed))
                    .route("/{id}/progress", web::get().to(posts::progress))
                    .route("/{id}/reschedule", web::post().to(posts::reschedule))
                    .route("/{id}/trigger", web::post().to(overdue::trigger))
                    .route("/{id}/force-fail", web::post().to(overdue::force_fail)),
            )
            // Overdue monitoring
            .service(
                web::scope("/overdue")
                    .route("", web::get().to(overdue::list_overdue))
                    .route("/scan", web::post().to(overdue::scan)),
            ),
    );
}
