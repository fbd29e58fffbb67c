//! In-memory [`NotificationStore`] for tests and local development.
//!
//! Single-mutex state with the same conditional-update semantics as the
//! PostgreSQL implementation: every guard check and mutation happens
//! under one lock acquisition, which is the in-process equivalent of the
//! single-statement conditional `UPDATE`s in the repository layer.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meridian_core::status::{CampaignStatus, DeliveryStatus};
use meridian_core::types::DbId;
use meridian_db::models::campaign::{Campaign, CampaignTarget, CreateCampaign};
use meridian_db::models::notification_log::{NewNotificationLog, NotificationLog};

use crate::error::StoreError;
use crate::store::NotificationStore;

#[derive(Default)]
struct Inner {
    logs: HashMap<DbId, NotificationLog>,
    campaigns: HashMap<DbId, Campaign>,
    targets: HashMap<DbId, CampaignTarget>,
    next_log_id: DbId,
    next_campaign_id: DbId,
    next_target_id: DbId,
}

/// Mutex-guarded in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every log row, ordered by id (test assertions).
    pub fn all_logs(&self) -> Vec<NotificationLog> {
        let inner = self.inner.lock().unwrap();
        let mut logs: Vec<_> = inner.logs.values().cloned().collect();
        logs.sort_by_key(|l| l.id);
        logs
    }

    /// Snapshot of every target row, ordered by id (test assertions).
    pub fn all_targets(&self) -> Vec<CampaignTarget> {
        let inner = self.inner.lock().unwrap();
        let mut targets: Vec<_> = inner.targets.values().cloned().collect();
        targets.sort_by_key(|t| t.id);
        targets
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_log(&self, new: NewNotificationLog) -> Result<NotificationLog, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_log_id += 1;
        let id = inner.next_log_id;
        let now = Utc::now();
        let log = NotificationLog {
            id,
            notification_type_id: new.notification_type_id,
            template_id: new.template_id,
            channel: new.channel,
            recipient: new.recipient,
            message_content: new.message_content,
            status_id: DeliveryStatus::Pending.id(),
            attempt_count: 1,
            max_attempts: new.max_attempts,
            campaign_id: new.campaign_id,
            provider_message_id: None,
            error_reason: None,
            created_at: now,
            updated_at: now,
        };
        inner.logs.insert(id, log.clone());
        Ok(log)
    }

    async fn log_by_id(&self, id: DbId) -> Result<Option<NotificationLog>, StoreError> {
        Ok(self.inner.lock().unwrap().logs.get(&id).cloned())
    }

    async fn mark_log_sent(
        &self,
        id: DbId,
        provider_message_id: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(log) = inner.logs.get_mut(&id) else {
            return Ok(false);
        };
        if log.status_id != DeliveryStatus::Pending.id() {
            return Ok(false);
        }
        log.status_id = DeliveryStatus::Sent.id();
        log.provider_message_id = Some(provider_message_id.to_string());
        log.error_reason = None;
        log.updated_at = Utc::now();
        Ok(true)
    }

    async fn mark_log_failed(&self, id: DbId, reason: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(log) = inner.logs.get_mut(&id) else {
            return Ok(false);
        };
        if !DeliveryStatus::Failed.can_transition_from(log.status()) {
            return Ok(false);
        }
        log.status_id = DeliveryStatus::Failed.id();
        log.error_reason = Some(reason.to_string());
        log.updated_at = Utc::now();
        Ok(true)
    }

    async fn advance_log_status(&self, id: DbId, to: DeliveryStatus) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(log) = inner.logs.get_mut(&id) else {
            return Ok(false);
        };
        if !to.can_transition_from(log.status()) {
            return Ok(false);
        }
        log.status_id = to.id();
        log.updated_at = Utc::now();
        Ok(true)
    }

    async fn begin_retry(&self, id: DbId) -> Result<Option<NotificationLog>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(log) = inner.logs.get_mut(&id) else {
            return Ok(None);
        };
        if log.status_id != DeliveryStatus::Failed.id() || log.attempt_count >= log.max_attempts {
            return Ok(None);
        }
        log.status_id = DeliveryStatus::Pending.id();
        log.attempt_count += 1;
        log.error_reason = None;
        log.updated_at = Utc::now();
        Ok(Some(log.clone()))
    }

    async fn archive_logs_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let live_campaigns: Vec<DbId> = inner
            .campaigns
            .values()
            .filter(|c| !c.status().is_terminal())
            .map(|c| c.id)
            .collect();
        let before = inner.logs.len();
        inner.logs.retain(|_, log| {
            let old_enough = log.created_at < cutoff;
            let protected = log
                .campaign_id
                .map(|cid| live_campaigns.contains(&cid))
                .unwrap_or(false);
            !(old_enough && !protected)
        });
        Ok((before - inner.logs.len()) as u64)
    }

    async fn insert_campaign(
        &self,
        input: CreateCampaign,
        initial_status: CampaignStatus,
    ) -> Result<Campaign, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_campaign_id += 1;
        let id = inner.next_campaign_id;
        let now = Utc::now();
        let campaign = Campaign {
            id,
            name: input.name,
            message_template: input.message_template,
            channel: input.channel,
            status_id: initial_status.id(),
            target_criteria: input.target_criteria,
            scheduled_at: input.scheduled_at,
            messages_per_minute: input.messages_per_minute,
            total_leads: 0,
            sent_count: 0,
            delivered_count: 0,
            read_count: 0,
            failed_count: 0,
            created_at: now,
            updated_at: now,
        };
        inner.campaigns.insert(id, campaign.clone());
        Ok(campaign)
    }

    async fn campaign_by_id(&self, id: DbId) -> Result<Option<Campaign>, StoreError> {
        Ok(self.inner.lock().unwrap().campaigns.get(&id).cloned())
    }

    async fn transition_campaign(
        &self,
        id: DbId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(campaign) = inner.campaigns.get_mut(&id) else {
            return Ok(false);
        };
        if campaign.status_id != from.id() {
            return Ok(false);
        }
        campaign.status_id = to.id();
        campaign.updated_at = Utc::now();
        Ok(true)
    }

    async fn cancel_campaign(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(campaign) = inner.campaigns.get_mut(&id) else {
            return Ok(false);
        };
        if campaign.status().is_terminal() {
            return Ok(false);
        }
        campaign.status_id = CampaignStatus::Cancelled.id();
        campaign.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_campaign_total(&self, id: DbId, total: i32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(campaign) = inner.campaigns.get_mut(&id) {
            campaign.total_leads = total;
            campaign.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn increment_sent(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(c) = inner.campaigns.get_mut(&id) else {
            return Ok(false);
        };
        if c.sent_count + c.failed_count >= c.total_leads {
            return Ok(false);
        }
        c.sent_count += 1;
        c.updated_at = Utc::now();
        Ok(true)
    }

    async fn increment_failed(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(c) = inner.campaigns.get_mut(&id) else {
            return Ok(false);
        };
        if c.sent_count + c.failed_count >= c.total_leads {
            return Ok(false);
        }
        c.failed_count += 1;
        c.updated_at = Utc::now();
        Ok(true)
    }

    async fn shift_failed_to_sent(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(c) = inner.campaigns.get_mut(&id) else {
            return Ok(false);
        };
        if c.failed_count == 0 {
            return Ok(false);
        }
        c.failed_count -= 1;
        c.sent_count += 1;
        c.updated_at = Utc::now();
        Ok(true)
    }

    async fn increment_delivered(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(c) = inner.campaigns.get_mut(&id) else {
            return Ok(false);
        };
        if c.delivered_count >= c.sent_count {
            return Ok(false);
        }
        c.delivered_count += 1;
        c.updated_at = Utc::now();
        Ok(true)
    }

    async fn increment_read(&self, id: DbId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(c) = inner.campaigns.get_mut(&id) else {
            return Ok(false);
        };
        if c.read_count >= c.delivered_count {
            return Ok(false);
        }
        c.read_count += 1;
        c.updated_at = Utc::now();
        Ok(true)
    }

    async fn due_scheduled_campaigns(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut due: Vec<_> = inner
            .campaigns
            .values()
            .filter(|c| {
                c.status_id == CampaignStatus::Scheduled.id()
                    && c.scheduled_at.map(|at| at <= now).unwrap_or(false)
            })
            .cloned()
            .collect();
        due.sort_by_key(|c| c.scheduled_at);
        Ok(due)
    }

    async fn insert_targets(
        &self,
        campaign_id: DbId,
        lead_ids: &[DbId],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        for lead_id in lead_ids {
            inner.next_target_id += 1;
            let id = inner.next_target_id;
            inner.targets.insert(
                id,
                CampaignTarget {
                    id,
                    campaign_id,
                    lead_id: *lead_id,
                    notification_log_id: None,
                    created_at: Utc::now(),
                },
            );
        }
        Ok(())
    }

    async fn pending_targets(
        &self,
        campaign_id: DbId,
    ) -> Result<Vec<CampaignTarget>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut pending: Vec<_> = inner
            .targets
            .values()
            .filter(|t| t.campaign_id == campaign_id && t.notification_log_id.is_none())
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.id);
        Ok(pending)
    }

    async fn set_target_log(&self, target_id: DbId, log_id: DbId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(target) = inner.targets.get_mut(&target_id) {
            target.notification_log_id = Some(log_id);
        }
        Ok(())
    }

    async fn failed_log_ids(&self, campaign_id: DbId) -> Result<Vec<DbId>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<DbId> = inner
            .targets
            .values()
            .filter(|t| t.campaign_id == campaign_id)
            .filter_map(|t| t.notification_log_id)
            .filter(|log_id| {
                inner
                    .logs
                    .get(log_id)
                    .map(|l| l.status_id == DeliveryStatus::Failed.id())
                    .unwrap_or(false)
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
