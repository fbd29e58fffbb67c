//! Persistence seam for the notification engine.
//!
//! [`NotificationStore`] is the narrow interface the sender, reconciler,
//! and dispatch engine need from durable storage. [`pg::PgStore`] backs
//! it with PostgreSQL via the repository layer; [`memory::MemoryStore`]
//! backs it with in-process state for tests and local development.
//!
//! Conditional-update methods return `bool`: `true` means the transition
//! or increment applied, `false` means the guard rejected it (already
//! transitioned, invariant bound reached, wrong source status). Callers
//! branch on that instead of re-reading state.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meridian_core::status::{CampaignStatus, DeliveryStatus};
use meridian_core::types::DbId;
use meridian_db::models::campaign::{Campaign, CampaignTarget, CreateCampaign};
use meridian_db::models::notification_log::{NewNotificationLog, NotificationLog};

use crate::error::StoreError;

/// Durable state operations used by the engine.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    // --- Notification logs ---

    /// Insert a new `pending` log row (attempt 1).
    async fn insert_log(&self, new: NewNotificationLog) -> Result<NotificationLog, StoreError>;

    /// Fetch a log by id.
    async fn log_by_id(&self, id: DbId) -> Result<Option<NotificationLog>, StoreError>;

    /// Mark a pending log `sent` with the provider message id.
    async fn mark_log_sent(&self, id: DbId, provider_message_id: &str)
        -> Result<bool, StoreError>;

    /// Mark a log `failed` with a reason (from `pending`/`sent` only).
    async fn mark_log_failed(&self, id: DbId, reason: &str) -> Result<bool, StoreError>;

    /// Forward-only status advance per
    /// [`DeliveryStatus::allowed_sources`].
    async fn advance_log_status(&self, id: DbId, to: DeliveryStatus) -> Result<bool, StoreError>;

    /// Admit a retry: `failed` + under the attempt cap → `pending` with
    /// `attempt_count + 1`. Returns the refreshed row when admitted.
    async fn begin_retry(&self, id: DbId) -> Result<Option<NotificationLog>, StoreError>;

    /// Delete logs older than `cutoff` not attached to a live campaign.
    /// Returns the number removed.
    async fn archive_logs_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    // --- Campaigns ---

    /// Insert a campaign in `draft` or `scheduled`.
    async fn insert_campaign(
        &self,
        input: CreateCampaign,
        initial_status: CampaignStatus,
    ) -> Result<Campaign, StoreError>;

    /// Fetch a campaign by id.
    async fn campaign_by_id(&self, id: DbId) -> Result<Option<Campaign>, StoreError>;

    /// Compare-and-set status move.
    async fn transition_campaign(
        &self,
        id: DbId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, StoreError>;

    /// Cancel from any non-terminal status.
    async fn cancel_campaign(&self, id: DbId) -> Result<bool, StoreError>;

    /// Record the expanded recipient count.
    async fn set_campaign_total(&self, id: DbId, total: i32) -> Result<(), StoreError>;

    /// `sent_count + 1`, bounded by `sent + failed < total`.
    async fn increment_sent(&self, id: DbId) -> Result<bool, StoreError>;

    /// `failed_count + 1`, bounded by `sent + failed < total`.
    async fn increment_failed(&self, id: DbId) -> Result<bool, StoreError>;

    /// Successful retry: `failed_count - 1`, `sent_count + 1` atomically.
    async fn shift_failed_to_sent(&self, id: DbId) -> Result<bool, StoreError>;

    /// `delivered_count + 1`, bounded by `delivered < sent`.
    async fn increment_delivered(&self, id: DbId) -> Result<bool, StoreError>;

    /// `read_count + 1`, bounded by `read < delivered`.
    async fn increment_read(&self, id: DbId) -> Result<bool, StoreError>;

    /// Scheduled campaigns due for execution.
    async fn due_scheduled_campaigns(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, StoreError>;

    // --- Campaign targets ---

    /// Create one target row per lead.
    async fn insert_targets(&self, campaign_id: DbId, lead_ids: &[DbId])
        -> Result<(), StoreError>;

    /// Targets without a log yet, in enumeration order.
    async fn pending_targets(&self, campaign_id: DbId)
        -> Result<Vec<CampaignTarget>, StoreError>;

    /// Attach the log a target's send produced.
    async fn set_target_log(&self, target_id: DbId, log_id: DbId) -> Result<(), StoreError>;

    /// Log ids of the campaign's failed sends.
    async fn failed_log_ids(&self, campaign_id: DbId) -> Result<Vec<DbId>, StoreError>;
}
