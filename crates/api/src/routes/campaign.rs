//! Route definitions for the `/campaigns` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::campaign;
use crate::state::AppState;

/// Routes mounted at `/campaigns`.
///
/// ```text
/// POST   /                    -> create_campaign
/// GET    /{id}                -> get_campaign
/// POST   /{id}/execute        -> execute_campaign
/// POST   /{id}/pause          -> pause_campaign
/// POST   /{id}/resume         -> resume_campaign
/// POST   /{id}/cancel         -> cancel_campaign
/// POST   /{id}/retry-failed   -> retry_failed
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(campaign::create_campaign))
        .route("/{id}", get(campaign::get_campaign))
        .route("/{id}/execute", post(campaign::execute_campaign))
        .route("/{id}/pause", post(campaign::pause_campaign))
        .route("/{id}/resume", post(campaign::resume_campaign))
        .route("/{id}/cancel", post(campaign::cancel_campaign))
        .route("/{id}/retry-failed", post(campaign::retry_failed))
}
