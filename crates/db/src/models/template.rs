//! Notification type and message template models and DTOs.

use meridian_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `notification_types` lookup table.
///
/// Immutable reference data used to classify templates.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationType {
    pub id: DbId,
    pub category: String,
    pub name: String,
    pub is_active: bool,
}

/// A row from the `message_templates` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MessageTemplate {
    pub id: DbId,
    pub notification_type_id: DbId,
    /// `whatsapp`, `email`, or `both`.
    pub channel: String,
    /// Email subject line; unused for WhatsApp-only templates.
    pub subject: Option<String>,
    pub body: String,
    /// Token names the author declared; informational, the renderer
    /// resolves whatever actually appears in the body.
    pub declared_variables: serde_json::Value,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new template.
#[derive(Debug, Deserialize)]
pub struct CreateTemplate {
    pub notification_type_id: DbId,
    pub channel: String,
    pub subject: Option<String>,
    pub body: String,
    pub declared_variables: Option<serde_json::Value>,
}

/// DTO for updating a template (all fields optional).
#[derive(Debug, Deserialize)]
pub struct UpdateTemplate {
    pub channel: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub declared_variables: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}
