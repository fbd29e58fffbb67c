//! Handlers for ad-hoc sends and render previews.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use meridian_core::context::ContextSource;
use meridian_core::render::render;
use meridian_core::types::DbId;
use meridian_notify::dispatch::{BulkOutcome, BulkSendRequest};

use crate::error::AppResult;
use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/messages/bulk
///
/// Send one rendered message to a list of customers. Small lists run
/// inline and answer with per-recipient results; larger lists are queued.
pub async fn bulk_send(
    State(state): State<AppState>,
    Json(input): Json<BulkSendRequest>,
) -> AppResult<Json<ApiResponse<BulkOutcome>>> {
    let outcome = state.engine.bulk_send(input).await?;
    let message = match &outcome {
        BulkOutcome::Queued { .. } => "Bulk send queued",
        BulkOutcome::Completed { .. } => "Bulk send finished",
    };
    Ok(Json(ApiResponse::ok(message, outcome)))
}

/// Request body for `POST /messages/preview`.
///
/// At most one entity id drives the context: a customer (optionally with
/// one policy), a policy, or a quotation. With no id at all the preview
/// renders against one real customer picked at random.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub template_body: String,
    pub customer_id: Option<DbId>,
    pub insurance_id: Option<DbId>,
    pub quotation_id: Option<DbId>,
}

/// Response payload of a preview render.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub preview: String,
}

/// POST /api/v1/messages/preview
///
/// Render a template body against live data. Synchronous; nothing is
/// persisted and nothing is sent.
pub async fn preview(
    State(state): State<AppState>,
    Json(input): Json<PreviewRequest>,
) -> AppResult<Json<ApiResponse<PreviewResponse>>> {
    let source = match (input.customer_id, input.insurance_id, input.quotation_id) {
        (Some(customer_id), insurance_id, _) => ContextSource::FromCustomer {
            customer_id,
            insurance_id,
        },
        (None, Some(insurance_id), _) => ContextSource::FromInsurance { insurance_id },
        (None, None, Some(quotation_id)) => ContextSource::FromQuotation { quotation_id },
        (None, None, None) => ContextSource::Sample,
    };

    let ctx = state.contexts.build(source).await?;
    let preview = render(&input.template_body, &ctx);

    Ok(Json(ApiResponse::ok(
        "Preview rendered",
        PreviewResponse { preview },
    )))
}
