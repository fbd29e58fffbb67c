//! Route definitions for inbound provider webhooks.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhook;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /whatsapp/status   -> whatsapp_status
/// POST   /email/status      -> email_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/whatsapp/status", post(webhook::whatsapp_status))
        .route("/email/status", post(webhook::email_status))
}
