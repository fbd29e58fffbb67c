pub mod campaign;
pub mod health;
pub mod message;
pub mod template;
pub mod webhook;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /campaigns                           create (POST)
/// /campaigns/{id}                      get (GET)
/// /campaigns/{id}/execute              execute (POST)
/// /campaigns/{id}/pause                pause (POST)
/// /campaigns/{id}/resume               resume (POST)
/// /campaigns/{id}/cancel               cancel (POST)
/// /campaigns/{id}/retry-failed         retry failed sends (POST)
///
/// /messages/bulk                       ad-hoc bulk send (POST)
/// /messages/preview                    render preview (POST)
///
/// /templates                           list, create (GET, POST)
/// /templates/variables                 variable catalogue (GET)
/// /templates/types                     notification types (GET)
/// /templates/{id}                      get, update, deactivate
///
/// /webhooks/whatsapp/status            delivery status callback (POST)
/// /webhooks/email/status               delivery status callback (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/campaigns", campaign::router())
        .nest("/messages", message::router())
        .nest("/templates", template::router())
        .nest("/webhooks", webhook::router())
}
