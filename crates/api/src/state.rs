use std::sync::Arc;

use meridian_notify::context::ContextBuilder;
use meridian_notify::dispatch::CampaignEngine;
use meridian_notify::reconciler::StatusReconciler;
use meridian_notify::sender::NotificationSender;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: meridian_db::DbPool,
    /// Server configuration (webhook secret, timeouts).
    pub config: Arc<ServerConfig>,
    /// Campaign dispatch engine.
    pub engine: Arc<CampaignEngine>,
    /// Single-send recording and retry.
    pub sender: Arc<NotificationSender>,
    /// Webhook delivery-status reconciler.
    pub reconciler: Arc<StatusReconciler>,
    /// Per-render context assembly for previews.
    pub contexts: ContextBuilder,
}
