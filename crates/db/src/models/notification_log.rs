//! Notification log model — the durable record of one send attempt.

use meridian_core::status::{DeliveryStatus, StatusId};
use meridian_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notification_logs` table.
///
/// Created `pending` at send time; mutated only by the delivery-status
/// reconciler and the retry path. `status_id` holds a
/// [`DeliveryStatus`](meridian_core::status::DeliveryStatus) id.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationLog {
    pub id: DbId,
    pub notification_type_id: Option<DbId>,
    pub template_id: Option<DbId>,
    pub channel: String,
    pub recipient: String,
    pub message_content: String,
    pub status_id: StatusId,
    pub attempt_count: i32,
    pub max_attempts: i32,
    pub campaign_id: Option<DbId>,
    pub provider_message_id: Option<String>,
    pub error_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl NotificationLog {
    /// Decoded delivery status. `status_id` is constrained by a foreign
    /// key to `notification_statuses`; ids outside the seed set decode as
    /// `Pending`.
    pub fn status(&self) -> DeliveryStatus {
        DeliveryStatus::from_id(self.status_id).unwrap_or(DeliveryStatus::Pending)
    }
}

/// Insert payload for a new (pending) log row.
#[derive(Debug, Clone)]
pub struct NewNotificationLog {
    pub notification_type_id: Option<DbId>,
    pub template_id: Option<DbId>,
    pub channel: String,
    pub recipient: String,
    pub message_content: String,
    pub max_attempts: i32,
    pub campaign_id: Option<DbId>,
}
