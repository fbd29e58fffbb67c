//! Campaign and campaign target models and DTOs.

use meridian_core::status::{CampaignStatus, StatusId};
use meridian_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `campaigns` table.
///
/// `status_id` holds a [`CampaignStatus`](meridian_core::status::CampaignStatus)
/// id. Counters are only ever mutated by single-statement conditional
/// increments, so `sent_count + failed_count <= total_leads` and
/// `read_count <= delivered_count <= sent_count` hold at every point in
/// time, including mid-crash.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Campaign {
    pub id: DbId,
    pub name: String,
    pub message_template: String,
    /// `whatsapp` or `email`.
    pub channel: String,
    pub status_id: StatusId,
    pub target_criteria: serde_json::Value,
    pub scheduled_at: Option<Timestamp>,
    pub messages_per_minute: i32,
    pub total_leads: i32,
    pub sent_count: i32,
    pub delivered_count: i32,
    pub read_count: i32,
    pub failed_count: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Campaign {
    /// Decoded campaign status. `status_id` is constrained by a foreign
    /// key to `campaign_statuses`; ids outside the seed set decode as
    /// `Draft`.
    pub fn status(&self) -> CampaignStatus {
        CampaignStatus::from_id(self.status_id).unwrap_or(CampaignStatus::Draft)
    }
}

/// A row from the `campaign_targets` link table — one per expanded
/// recipient, pointing at the log row its send produced.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CampaignTarget {
    pub id: DbId,
    pub campaign_id: DbId,
    pub lead_id: DbId,
    pub notification_log_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// DTO for creating a campaign.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    pub message_template: String,
    pub channel: String,
    pub target_criteria: serde_json::Value,
    pub scheduled_at: Option<Timestamp>,
    pub messages_per_minute: i32,
}
