//! Handlers for the `/campaigns` resource.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use meridian_core::error::CoreError;
use meridian_core::types::{DbId, Timestamp};
use meridian_db::models::campaign::{Campaign, CreateCampaign};
use meridian_db::repositories::CampaignRepo;
use meridian_notify::dispatch::{ExecuteOutcome, RetryReport};

use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Request body for `POST /campaigns`.
///
/// Shape constraints are checked here; the engine re-checks the domain
/// rules (rate bounds, future schedule, criteria) on its own.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1))]
    pub message_template: String,
    /// `whatsapp` or `email`.
    pub channel: String,
    pub target_criteria: serde_json::Value,
    pub scheduled_at: Option<Timestamp>,
    #[validate(range(min = 1, max = 1000))]
    pub messages_per_minute: i32,
}

/// POST /api/v1/campaigns
///
/// Create a campaign in `draft`, or `scheduled` when `scheduled_at` is set.
pub async fn create_campaign(
    State(state): State<AppState>,
    Json(input): Json<CreateCampaignRequest>,
) -> AppResult<Json<ApiResponse<Campaign>>> {
    input
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;

    let campaign = state
        .engine
        .create_campaign(CreateCampaign {
            name: input.name,
            message_template: input.message_template,
            channel: input.channel,
            target_criteria: input.target_criteria,
            scheduled_at: input.scheduled_at,
            messages_per_minute: input.messages_per_minute,
        })
        .await?;

    Ok(Json(ApiResponse::ok("Campaign created", campaign)))
}

/// GET /api/v1/campaigns/{id}
///
/// Fetch one campaign with its lifecycle status and counters.
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<ApiResponse<Campaign>>> {
    let campaign = CampaignRepo::find_by_id(&state.pool, campaign_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Campaign",
            id: campaign_id,
        }))?;

    Ok(Json(ApiResponse::ok("Campaign retrieved", campaign)))
}

/// POST /api/v1/campaigns/{id}/execute
///
/// Expand targets and start dispatching. Large campaigns are handed to
/// the background queue and answer `queued` immediately.
pub async fn execute_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<ApiResponse<ExecuteOutcome>>> {
    let outcome = state.engine.execute(campaign_id).await?;
    let message = match &outcome {
        ExecuteOutcome::Queued { .. } => "Campaign queued for dispatch",
        ExecuteOutcome::Inline { .. } => "Campaign dispatched",
    };
    Ok(Json(ApiResponse::ok(message, outcome)))
}

/// POST /api/v1/campaigns/{id}/pause
pub async fn pause_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<ApiResponse<Campaign>>> {
    let campaign = state.engine.pause(campaign_id).await?;
    Ok(Json(ApiResponse::ok("Campaign paused", campaign)))
}

/// POST /api/v1/campaigns/{id}/resume
pub async fn resume_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<ApiResponse<Campaign>>> {
    let campaign = state.engine.resume(campaign_id).await?;
    Ok(Json(ApiResponse::ok("Campaign resumed", campaign)))
}

/// POST /api/v1/campaigns/{id}/cancel
pub async fn cancel_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<ApiResponse<Campaign>>> {
    let campaign = state.engine.cancel(campaign_id).await?;
    Ok(Json(ApiResponse::ok("Campaign cancelled", campaign)))
}

/// POST /api/v1/campaigns/{id}/retry-failed
///
/// Re-attempt every failed send still under its attempt cap. Reports how
/// many were retried and how many skipped.
pub async fn retry_failed(
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<ApiResponse<RetryReport>>> {
    let report = state.engine.retry_failed(campaign_id).await?;
    Ok(Json(ApiResponse::ok("Retry pass finished", report)))
}
