//! HTTP API served under `/api/v1`.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/status` | Current scan status |
//! | GET | `/system` | System profile |
//! | GET | `/applications` | Stored inventory |
//! | PATCH / DELETE | `/applications/{id}` | Edit or remove one application |
//! | POST | `/delete_app/{id}` | Legacy delete |
//! | GET | `/scans` | Scan history, newest first |
//! | PATCH / DELETE | `/scans/{id}` | Edit or remove one scan result |
//! | POST | `/scan` | Start a background scan |
//! | POST | `/send_data` | Upload the export document to the remote URL |
//! | GET | `/dashboard` | Status, profile and inventory in one call |
//!
//! Successful responses use `{"status": "success", ...}`; failures use the
//! [`ApiError`] envelope.

mod error;
mod handlers;

pub use error::{ApiError, ApiResult};

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::service::AppContext;

pub type AppState = Arc<AppContext>;

/// Builds the API router bound to `ctx`.
pub fn router(ctx: AppState) -> Router {
    let api = Router::new()
        .route("/status", get(handlers::get_status))
        .route("/system", get(handlers::get_system))
        .route("/applications", get(handlers::get_applications))
        .route(
            "/applications/{id}",
            patch(handlers::update_application).delete(handlers::delete_application),
        )
        .route("/delete_app/{id}", post(handlers::delete_application))
        .route("/scans", get(handlers::get_scans))
        .route(
            "/scans/{id}",
            patch(handlers::update_scan_result).delete(handlers::delete_scan_result),
        )
        .route("/scan", post(handlers::trigger_scan))
        .route("/send_data", post(handlers::send_data))
        .route("/dashboard", get(handlers::get_dashboard));

    Router::new()
        .nest("/api/v1", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
