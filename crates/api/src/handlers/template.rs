//! Handlers for the `/templates` resource and the variable catalogue.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use meridian_core::channels::TemplateChannel;
use meridian_core::error::CoreError;
use meridian_core::types::DbId;
use meridian_core::variables;
use meridian_db::models::template::{
    CreateTemplate, MessageTemplate, NotificationType, UpdateTemplate,
};
use meridian_db::repositories::TemplateRepo;

use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Query parameters for `GET /templates`.
#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    /// Restrict to one notification type.
    pub notification_type_id: Option<DbId>,
    /// If `true`, return only active templates. Defaults to `false`.
    pub active_only: Option<bool>,
}

/// Query parameters for `GET /templates/variables`.
#[derive(Debug, Deserialize)]
pub struct VariableQuery {
    /// Restrict the catalogue to one category.
    pub category: Option<String>,
}

/// Reject a template body whose plain tokens are not in the catalogue.
///
/// Dotted paths resolve structurally at render time and are not flagged.
fn check_body_tokens(body: &str) -> Result<(), CoreError> {
    let unknown = variables::unknown_tokens(body);
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unknown template variables: {}",
            unknown.join(", ")
        )))
    }
}

fn check_channel(channel: &str) -> Result<(), CoreError> {
    if TemplateChannel::parse(channel).is_none() {
        return Err(CoreError::Validation(format!(
            "Unknown template channel: {channel}"
        )));
    }
    Ok(())
}

/// POST /api/v1/templates
pub async fn create_template(
    State(state): State<AppState>,
    Json(input): Json<CreateTemplate>,
) -> AppResult<Json<ApiResponse<MessageTemplate>>> {
    check_channel(&input.channel)?;
    check_body_tokens(&input.body)?;

    TemplateRepo::find_type_by_id(&state.pool, input.notification_type_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "NotificationType",
            id: input.notification_type_id,
        }))?;

    let template = TemplateRepo::create(&state.pool, &input).await?;
    Ok(Json(ApiResponse::ok("Template created", template)))
}

/// GET /api/v1/templates
pub async fn list_templates(
    State(state): State<AppState>,
    Query(params): Query<TemplateQuery>,
) -> AppResult<Json<ApiResponse<Vec<MessageTemplate>>>> {
    let templates = TemplateRepo::list(
        &state.pool,
        params.notification_type_id,
        params.active_only.unwrap_or(false),
    )
    .await?;
    Ok(Json(ApiResponse::ok("Templates listed", templates)))
}

/// GET /api/v1/templates/{id}
pub async fn get_template(
    State(state): State<AppState>,
    Path(template_id): Path<DbId>,
) -> AppResult<Json<ApiResponse<MessageTemplate>>> {
    let template = TemplateRepo::find_by_id(&state.pool, template_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Template",
            id: template_id,
        }))?;
    Ok(Json(ApiResponse::ok("Template retrieved", template)))
}

/// PUT /api/v1/templates/{id}
///
/// Patch a template; unset fields keep their current values.
pub async fn update_template(
    State(state): State<AppState>,
    Path(template_id): Path<DbId>,
    Json(input): Json<UpdateTemplate>,
) -> AppResult<Json<ApiResponse<MessageTemplate>>> {
    if let Some(channel) = &input.channel {
        check_channel(channel)?;
    }
    if let Some(body) = &input.body {
        check_body_tokens(body)?;
    }

    let template = TemplateRepo::update(&state.pool, template_id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Template",
            id: template_id,
        }))?;
    Ok(Json(ApiResponse::ok("Template updated", template)))
}

/// DELETE /api/v1/templates/{id}
///
/// Soft-invalidate: templates referenced by pending campaigns are never
/// hard-deleted, they are deactivated.
pub async fn deactivate_template(
    State(state): State<AppState>,
    Path(template_id): Path<DbId>,
) -> AppResult<Json<ApiResponse<()>>> {
    let found = TemplateRepo::deactivate(&state.pool, template_id).await?;
    if !found {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Template",
            id: template_id,
        }));
    }
    Ok(Json(ApiResponse::message("Template deactivated")))
}

/// GET /api/v1/templates/variables
///
/// The variable catalogue grouped by category, for the template editor's
/// picker. An unknown category filter yields an empty map.
pub async fn list_variables(
    Query(params): Query<VariableQuery>,
) -> Json<ApiResponse<serde_json::Value>> {
    let grouped = variables::grouped_by_category(params.category.as_deref());
    Json(ApiResponse::ok(
        "Variables listed",
        serde_json::json!({
            "categories": variables::all_categories(),
            "variables": grouped,
        }),
    ))
}

/// GET /api/v1/templates/types
///
/// The notification type catalogue used to classify templates.
pub async fn list_types(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<NotificationType>>>> {
    let types = TemplateRepo::list_types(&state.pool, true).await?;
    Ok(Json(ApiResponse::ok("Notification types listed", types)))
}
