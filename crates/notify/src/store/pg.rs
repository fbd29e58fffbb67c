//! PostgreSQL-backed [`NotificationStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meridian_core::status::{CampaignStatus, DeliveryStatus};
use meridian_core::types::DbId;
use meridian_db::models::campaign::{Campaign, CampaignTarget, CreateCampaign};
use meridian_db::models::notification_log::{NewNotificationLog, NotificationLog};
use meridian_db::repositories::{
    CampaignRepo, CampaignTargetRepo, NotificationLogRepo,
};
use meridian_db::DbPool;

use crate::error::StoreError;
use crate::store::NotificationStore;

/// Statuses from which a campaign may still be cancelled.
fn cancellable_status_ids() -> Vec<i16> {
    [
        CampaignStatus::Draft,
        CampaignStatus::Scheduled,
        CampaignStatus::Executing,
        CampaignStatus::Paused,
    ]
    .iter()
    .map(|s| s.id())
    .collect()
}

/// Terminal campaign statuses (archival may touch their logs).
fn terminal_status_ids() -> Vec<i16> {
    [CampaignStatus::Completed, CampaignStatus::Cancelled]
        .iter()
        .map(|s| s.id())
        .collect()
}

/// [`NotificationStore`] implementation over the repository layer.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_log(&self, new: NewNotificationLog) -> Result<NotificationLog, StoreError> {
        Ok(NotificationLogRepo::insert(&self.pool, &new).await?)
    }

    async fn log_by_id(&self, id: DbId) -> Result<Option<NotificationLog>, StoreError> {
        Ok(NotificationLogRepo::find_by_id(&self.pool, id).await?)
    }

    async fn mark_log_sent(
        &self,
        id: DbId,
        provider_message_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(NotificationLogRepo::mark_sent(&self.pool, id, provider_message_id).await?)
    }

    async fn mark_log_failed(&self, id: DbId, reason: &str) -> Result<bool, StoreError> {
        Ok(NotificationLogRepo::mark_failed(&self.pool, id, reason).await?)
    }

    async fn advance_log_status(&self, id: DbId, to: DeliveryStatus) -> Result<bool, StoreError> {
        let allowed: Vec<i16> = to.allowed_sources().iter().map(|s| s.id()).collect();
        Ok(NotificationLogRepo::advance_status(&self.pool, id, to, &allowed).await?)
    }

    async fn begin_retry(&self, id: DbId) -> Result<Option<NotificationLog>, StoreError> {
        Ok(NotificationLogRepo::begin_retry(&self.pool, id).await?)
    }

    async fn archive_logs_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let terminal = terminal_status_ids();
        Ok(NotificationLogRepo::archive_older_than(&self.pool, cutoff, &terminal).await?)
    }

    async fn insert_campaign(
        &self,
        input: CreateCampaign,
        initial_status: CampaignStatus,
    ) -> Result<Campaign, StoreError> {
        Ok(CampaignRepo::create(&self.pool, &input, initial_status).await?)
    }

    async fn campaign_by_id(&self, id: DbId) -> Result<Option<Campaign>, StoreError> {
        Ok(CampaignRepo::find_by_id(&self.pool, id).await?)
    }

    async fn transition_campaign(
        &self,
        id: DbId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, StoreError> {
        Ok(CampaignRepo::transition(&self.pool, id, from, to).await?)
    }

    async fn cancel_campaign(&self, id: DbId) -> Result<bool, StoreError> {
        let cancellable = cancellable_status_ids();
        Ok(CampaignRepo::cancel(&self.pool, id, &cancellable).await?)
    }

    async fn set_campaign_total(&self, id: DbId, total: i32) -> Result<(), StoreError> {
        Ok(CampaignRepo::set_total_leads(&self.pool, id, total).await?)
    }

    async fn increment_sent(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(CampaignRepo::increment_sent(&self.pool, id).await?)
    }

    async fn increment_failed(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(CampaignRepo::increment_failed(&self.pool, id).await?)
    }

    async fn shift_failed_to_sent(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(CampaignRepo::shift_failed_to_sent(&self.pool, id).await?)
    }

    async fn increment_delivered(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(CampaignRepo::increment_delivered(&self.pool, id).await?)
    }

    async fn increment_read(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(CampaignRepo::increment_read(&self.pool, id).await?)
    }

    async fn due_scheduled_campaigns(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, StoreError> {
        Ok(CampaignRepo::list_due_scheduled(&self.pool, now).await?)
    }

    async fn insert_targets(
        &self,
        campaign_id: DbId,
        lead_ids: &[DbId],
    ) -> Result<(), StoreError> {
        Ok(CampaignTargetRepo::insert_many(&self.pool, campaign_id, lead_ids).await?)
    }

    async fn pending_targets(
        &self,
        campaign_id: DbId,
    ) -> Result<Vec<CampaignTarget>, StoreError> {
        Ok(CampaignTargetRepo::list_pending(&self.pool, campaign_id).await?)
    }

    async fn set_target_log(&self, target_id: DbId, log_id: DbId) -> Result<(), StoreError> {
        Ok(CampaignTargetRepo::set_log(&self.pool, target_id, log_id).await?)
    }

    async fn failed_log_ids(&self, campaign_id: DbId) -> Result<Vec<DbId>, StoreError> {
        Ok(CampaignTargetRepo::failed_log_ids(&self.pool, campaign_id).await?)
    }
}
