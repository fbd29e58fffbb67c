//! Route definitions for ad-hoc sends and previews.

use axum::routing::post;
use axum::Router;

use crate::handlers::message;
use crate::state::AppState;

/// Routes mounted at `/messages`.
///
/// ```text
/// POST   /bulk      -> bulk_send
/// POST   /preview   -> preview
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bulk", post(message::bulk_send))
        .route("/preview", post(message::preview))
}
