//! Campaign dispatch engine.
//!
//! [`CampaignEngine`] owns the campaign lifecycle: creation, target
//! expansion, the throttled dispatch loop, pause/resume/cancel, failed-send
//! retries, and ad-hoc bulk sends. Whether an execution runs inline or on
//! the background queue is decided by the injected [`DispatchPolicy`], so
//! the thresholds are testable without a real queue.
//!
//! The dispatch loop sends sequentially in chunks of `messages_per_minute`
//! and sleeps out the remainder of the minute between chunks. The sleep is
//! the only intentional suspension besides the transport call itself and is
//! interrupted by `pause`; pause is cooperative — observed between chunks,
//! never mid-send.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use meridian_core::channels::Channel;
use meridian_core::error::CoreError;
use meridian_core::render::render;
use meridian_core::status::{CampaignStatus, DeliveryStatus};
use meridian_core::types::DbId;
use meridian_db::models::campaign::{Campaign, CampaignTarget, CreateCampaign};
use meridian_db::models::customer::Customer;

use crate::context::ContextBuilder;
use crate::error::NotifyError;
use crate::queue::{DispatchQueue, QueuedJob};
use crate::sender::{AttemptSpec, NotificationSender};
use crate::source::{EntitySource, TargetCriteria};
use crate::store::NotificationStore;
use crate::transport::OutboundMessage;

/// Lower bound for `messages_per_minute`.
const MIN_MESSAGES_PER_MINUTE: i32 = 1;

/// Upper bound for `messages_per_minute`.
const MAX_MESSAGES_PER_MINUTE: i32 = 1000;

/// The throttle window: one chunk of sends per window.
const THROTTLE_WINDOW: Duration = Duration::from_secs(60);

/// Default recipient count above which a campaign execution is queued.
const DEFAULT_CAMPAIGN_QUEUE_THRESHOLD: usize = 50;

/// Default recipient count up to which a bulk send runs inline.
const DEFAULT_BULK_INLINE_LIMIT: usize = 10;

// ---------------------------------------------------------------------------
// DispatchPolicy
// ---------------------------------------------------------------------------

/// Decides whether an execution runs inline or is deferred to the queue.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Campaigns with more recipients than this are queued.
    pub campaign_queue_threshold: usize,
    /// Bulk sends with at most this many recipients run inline.
    pub bulk_inline_limit: usize,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            campaign_queue_threshold: DEFAULT_CAMPAIGN_QUEUE_THRESHOLD,
            bulk_inline_limit: DEFAULT_BULK_INLINE_LIMIT,
        }
    }
}

impl DispatchPolicy {
    /// Whether a campaign with `recipient_count` targets is queued.
    pub fn queues_campaign(&self, recipient_count: usize) -> bool {
        recipient_count > self.campaign_queue_threshold
    }

    /// Whether a bulk send with `recipient_count` targets runs inline.
    pub fn bulk_runs_inline(&self, recipient_count: usize) -> bool {
        recipient_count <= self.bulk_inline_limit
    }
}

// ---------------------------------------------------------------------------
// Request / outcome types
// ---------------------------------------------------------------------------

/// An ad-hoc bulk send outside any campaign.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkSendRequest {
    pub channel: Channel,
    /// Template body rendered per recipient.
    pub body: String,
    /// Email subject; ignored on WhatsApp.
    pub subject: Option<String>,
    pub customer_ids: Vec<DbId>,
}

/// How an `execute` call was carried out.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecuteOutcome {
    /// Handed to the background queue; dispatch continues there.
    Queued { campaign_id: DbId, total_leads: i32 },
    /// Ran inline; the returned row carries the resulting counters and
    /// status (`completed`, or `paused` if the run was interrupted).
    Inline { campaign: Campaign },
}

/// Per-recipient result of an inline bulk send.
#[derive(Debug, Serialize)]
pub struct BulkItemResult {
    pub customer_id: DbId,
    pub log_id: Option<DbId>,
    /// Canonical delivery status after the attempt, or `skipped` when no
    /// send was made.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a bulk send request.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BulkOutcome {
    /// Too large for inline execution; deferred to the queue.
    Queued { total: usize },
    /// Ran inline; per-recipient results included.
    Completed {
        sent_count: usize,
        failed_count: usize,
        results: Vec<BulkItemResult>,
    },
}

/// Aggregated result of `retry_failed`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RetryReport {
    /// Logs for which a new attempt was made (regardless of its outcome).
    pub retried: usize,
    /// Logs skipped because they were no longer retryable.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// CampaignEngine
// ---------------------------------------------------------------------------

/// Expands, throttles, and drives campaign and bulk sends.
pub struct CampaignEngine {
    store: Arc<dyn NotificationStore>,
    source: Arc<dyn EntitySource>,
    sender: Arc<NotificationSender>,
    queue: Arc<dyn DispatchQueue>,
    contexts: ContextBuilder,
    policy: DispatchPolicy,
    /// One cancellation token per in-flight dispatch loop; `pause` fires it
    /// so the throttle sleep ends early.
    run_tokens: Mutex<HashMap<DbId, CancellationToken>>,
}

impl CampaignEngine {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        source: Arc<dyn EntitySource>,
        sender: Arc<NotificationSender>,
        queue: Arc<dyn DispatchQueue>,
        policy: DispatchPolicy,
    ) -> Self {
        let contexts = ContextBuilder::new(Arc::clone(&source));
        Self {
            store,
            source,
            sender,
            queue,
            contexts,
            policy,
            run_tokens: Mutex::new(HashMap::new()),
        }
    }

    // --- Lifecycle operations ---

    /// Validate and persist a new campaign.
    ///
    /// Starts in `scheduled` when `scheduled_at` is set (and in the
    /// future), otherwise in `draft`.
    pub async fn create_campaign(&self, input: CreateCampaign) -> Result<Campaign, NotifyError> {
        if Channel::parse(&input.channel).is_none() {
            return Err(CoreError::Validation(format!(
                "Unknown campaign channel: {}",
                input.channel
            ))
            .into());
        }
        if !(MIN_MESSAGES_PER_MINUTE..=MAX_MESSAGES_PER_MINUTE).contains(&input.messages_per_minute)
        {
            return Err(CoreError::Validation(format!(
                "messages_per_minute must be between {MIN_MESSAGES_PER_MINUTE} and {MAX_MESSAGES_PER_MINUTE}"
            ))
            .into());
        }
        if let Some(scheduled_at) = input.scheduled_at {
            if scheduled_at <= Utc::now() {
                return Err(
                    CoreError::Validation("scheduled_at must be in the future".to_string()).into(),
                );
            }
        }
        // Reject malformed criteria at creation time, not at execution.
        TargetCriteria::parse(&input.target_criteria)?;

        let initial = if input.scheduled_at.is_some() {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Draft
        };
        let campaign = self.store.insert_campaign(input, initial).await?;
        tracing::info!(
            campaign_id = campaign.id,
            name = %campaign.name,
            status = campaign.status().as_str(),
            "Campaign created"
        );
        Ok(campaign)
    }

    /// Expand targets and start dispatching.
    ///
    /// Allowed from `draft` or `scheduled` only. Target rows are created
    /// and `total_leads` recorded before the status moves to `executing`.
    /// Above the policy threshold the run is deferred to the queue and the
    /// call returns immediately; otherwise it runs to completion inline.
    pub async fn execute(&self, campaign_id: DbId) -> Result<ExecuteOutcome, NotifyError> {
        let campaign = self.require_campaign(campaign_id).await?;
        let status = campaign.status();
        if !status.can_execute() {
            return Err(CoreError::Conflict(format!(
                "Campaign {campaign_id} cannot be executed from status {}",
                status.as_str()
            ))
            .into());
        }

        let leads = self.source.expand_targets(&campaign.target_criteria).await?;
        if leads.is_empty() {
            return Err(
                CoreError::Validation("Target criteria matched no recipients".to_string()).into(),
            );
        }
        let lead_ids: Vec<DbId> = leads.iter().map(|c| c.id).collect();
        let total = lead_ids.len();

        self.store.insert_targets(campaign_id, &lead_ids).await?;
        self.store.set_campaign_total(campaign_id, total as i32).await?;

        if !self
            .store
            .transition_campaign(campaign_id, status, CampaignStatus::Executing)
            .await?
        {
            // Lost a race with a concurrent execute/cancel.
            return Err(CoreError::Conflict(format!(
                "Campaign {campaign_id} was picked up by another caller"
            ))
            .into());
        }

        tracing::info!(campaign_id, total, "Campaign execution started");

        if self.policy.queues_campaign(total) {
            self.queue
                .enqueue(QueuedJob::Campaign { campaign_id })
                .map_err(|e| CoreError::Internal(e.to_string()))?;
            return Ok(ExecuteOutcome::Queued {
                campaign_id,
                total_leads: total as i32,
            });
        }

        self.run_campaign(campaign_id).await?;
        let campaign = self.require_campaign(campaign_id).await?;
        Ok(ExecuteOutcome::Inline { campaign })
    }

    /// Pause a running campaign.
    ///
    /// Conditional `executing → paused` move plus a token fire so an
    /// in-flight loop wakes from its throttle sleep. The loop observes the
    /// status before each chunk, so no send is interrupted mid-flight.
    pub async fn pause(&self, campaign_id: DbId) -> Result<Campaign, NotifyError> {
        let applied = self
            .store
            .transition_campaign(campaign_id, CampaignStatus::Executing, CampaignStatus::Paused)
            .await?;
        if !applied {
            let campaign = self.require_campaign(campaign_id).await?;
            return Err(CoreError::Conflict(format!(
                "Campaign {campaign_id} cannot be paused from status {}",
                campaign.status().as_str()
            ))
            .into());
        }

        if let Some(token) = self.run_tokens.lock().unwrap().get(&campaign_id) {
            token.cancel();
        }
        tracing::info!(campaign_id, "Campaign paused");
        self.require_campaign(campaign_id).await
    }

    /// Resume a paused campaign.
    ///
    /// Remaining targets (those without a log) are re-dispatched on the
    /// background queue.
    pub async fn resume(&self, campaign_id: DbId) -> Result<Campaign, NotifyError> {
        let applied = self
            .store
            .transition_campaign(campaign_id, CampaignStatus::Paused, CampaignStatus::Executing)
            .await?;
        if !applied {
            let campaign = self.require_campaign(campaign_id).await?;
            return Err(CoreError::Conflict(format!(
                "Campaign {campaign_id} cannot be resumed from status {}",
                campaign.status().as_str()
            ))
            .into());
        }

        self.queue
            .enqueue(QueuedJob::Campaign { campaign_id })
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        tracing::info!(campaign_id, "Campaign resumed");
        self.require_campaign(campaign_id).await
    }

    /// Cancel a campaign from any non-terminal status.
    pub async fn cancel(&self, campaign_id: DbId) -> Result<Campaign, NotifyError> {
        if !self.store.cancel_campaign(campaign_id).await? {
            let campaign = self.require_campaign(campaign_id).await?;
            return Err(CoreError::Conflict(format!(
                "Campaign {campaign_id} is already {}",
                campaign.status().as_str()
            ))
            .into());
        }

        if let Some(token) = self.run_tokens.lock().unwrap().get(&campaign_id) {
            token.cancel();
        }
        tracing::info!(campaign_id, "Campaign cancelled");
        self.require_campaign(campaign_id).await
    }

    /// Retry every failed send of the campaign that is still under its
    /// attempt cap.
    ///
    /// "Retried" counts new attempts made, whatever their outcome; logs
    /// that became non-retryable in the meantime are counted as skipped.
    pub async fn retry_failed(&self, campaign_id: DbId) -> Result<RetryReport, NotifyError> {
        self.require_campaign(campaign_id).await?;

        let mut report = RetryReport {
            retried: 0,
            skipped: 0,
        };
        for log_id in self.store.failed_log_ids(campaign_id).await? {
            match self.sender.retry(log_id).await {
                Ok(_) => report.retried += 1,
                Err(NotifyError::Core(CoreError::RetryNotAllowed(reason))) => {
                    tracing::debug!(log_id, %reason, "Retry skipped");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            campaign_id,
            retried = report.retried,
            skipped = report.skipped,
            "Campaign retry pass finished"
        );
        Ok(report)
    }

    /// Send one rendered message to an ad-hoc list of customers.
    ///
    /// At most [`DispatchPolicy::bulk_inline_limit`] recipients run inline
    /// with per-recipient results; larger lists are queued.
    pub async fn bulk_send(&self, request: BulkSendRequest) -> Result<BulkOutcome, NotifyError> {
        if request.customer_ids.is_empty() {
            return Err(
                CoreError::Validation("Bulk send requires at least one recipient".to_string())
                    .into(),
            );
        }

        if !self.policy.bulk_runs_inline(request.customer_ids.len()) {
            let total = request.customer_ids.len();
            self.queue
                .enqueue(QueuedJob::Bulk { request })
                .map_err(|e| CoreError::Internal(e.to_string()))?;
            tracing::info!(total, "Bulk send queued");
            return Ok(BulkOutcome::Queued { total });
        }

        let results = self.run_bulk(&request).await?;
        let sent_count = results.iter().filter(|r| r.status == "sent").count();
        let failed_count = results.len() - sent_count;
        Ok(BulkOutcome::Completed {
            sent_count,
            failed_count,
            results,
        })
    }

    // --- Queue integration ---

    /// Entry point for the queue worker.
    pub async fn process_job(&self, job: QueuedJob) -> Result<(), NotifyError> {
        match job {
            QueuedJob::Campaign { campaign_id } => self.run_campaign(campaign_id).await,
            QueuedJob::Bulk { request } => {
                let results = self.run_bulk(&request).await?;
                let sent = results.iter().filter(|r| r.status == "sent").count();
                tracing::info!(
                    total = results.len(),
                    sent,
                    failed = results.len() - sent,
                    "Queued bulk send finished"
                );
                Ok(())
            }
        }
    }

    // --- Dispatch internals ---

    /// Run the throttled dispatch loop for one campaign.
    async fn run_campaign(&self, campaign_id: DbId) -> Result<(), NotifyError> {
        let cancel = self.register_run(campaign_id);
        let result = self.dispatch_loop(campaign_id, &cancel).await;
        self.run_tokens.lock().unwrap().remove(&campaign_id);
        result
    }

    async fn dispatch_loop(
        &self,
        campaign_id: DbId,
        cancel: &CancellationToken,
    ) -> Result<(), NotifyError> {
        loop {
            let campaign = self.require_campaign(campaign_id).await?;
            if campaign.status() != CampaignStatus::Executing {
                tracing::info!(
                    campaign_id,
                    status = campaign.status().as_str(),
                    "Dispatch loop stopping"
                );
                return Ok(());
            }
            let channel = Channel::parse(&campaign.channel).ok_or_else(|| {
                CoreError::Internal(format!(
                    "Campaign {campaign_id} has unknown channel {}",
                    campaign.channel
                ))
            })?;

            let pending = self.store.pending_targets(campaign_id).await?;
            if pending.is_empty() {
                if self
                    .store
                    .transition_campaign(
                        campaign_id,
                        CampaignStatus::Executing,
                        CampaignStatus::Completed,
                    )
                    .await?
                {
                    tracing::info!(campaign_id, "Campaign completed");
                }
                return Ok(());
            }

            let chunk_len = (campaign.messages_per_minute.max(1) as usize).min(pending.len());
            let last_chunk = chunk_len == pending.len();
            for target in pending.into_iter().take(chunk_len) {
                self.dispatch_target(&campaign, channel, &target).await?;
            }
            if last_chunk {
                // Next iteration observes no pending targets and completes.
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(campaign_id, "Throttle sleep interrupted");
                    return Ok(());
                }
                _ = tokio::time::sleep(THROTTLE_WINDOW) => {}
            }
        }
    }

    /// Send to one campaign target and settle its counters.
    ///
    /// The log id lands on the target row first, so a crash between the
    /// send and the counter update under-counts rather than re-sends.
    async fn dispatch_target(
        &self,
        campaign: &Campaign,
        channel: Channel,
        target: &CampaignTarget,
    ) -> Result<(), NotifyError> {
        let lead = self.source.customer(target.lead_id).await?;
        let message = match &lead {
            Some(lead) => {
                let ctx = self.contexts.build_for_lead(lead).await?;
                OutboundMessage {
                    channel,
                    recipient: address_for(lead, channel).unwrap_or_default(),
                    subject: None,
                    body: render(&campaign.message_template, &ctx),
                    attachment: None,
                }
            }
            // The lead vanished between expansion and send; the transport
            // rejects the empty recipient and the log records the failure.
            None => OutboundMessage {
                channel,
                recipient: String::new(),
                subject: None,
                body: campaign.message_template.clone(),
                attachment: None,
            },
        };

        let log = self
            .sender
            .record_attempt(AttemptSpec {
                notification_type_id: None,
                template_id: None,
                message,
                campaign_id: Some(campaign.id),
            })
            .await?;
        self.store.set_target_log(target.id, log.id).await?;

        if log.status() == DeliveryStatus::Sent {
            self.store.increment_sent(campaign.id).await?;
        } else {
            self.store.increment_failed(campaign.id).await?;
        }
        Ok(())
    }

    /// Sequentially send one bulk request, collecting per-recipient results.
    async fn run_bulk(&self, request: &BulkSendRequest) -> Result<Vec<BulkItemResult>, NotifyError> {
        let mut results = Vec::with_capacity(request.customer_ids.len());
        for &customer_id in &request.customer_ids {
            let Some(customer) = self.source.customer(customer_id).await? else {
                results.push(BulkItemResult {
                    customer_id,
                    log_id: None,
                    status: "skipped".to_string(),
                    error: Some("customer not found".to_string()),
                });
                continue;
            };

            let ctx = self.contexts.build_for_lead(&customer).await?;
            let log = self
                .sender
                .record_attempt(AttemptSpec {
                    notification_type_id: None,
                    template_id: None,
                    message: OutboundMessage {
                        channel: request.channel,
                        recipient: address_for(&customer, request.channel).unwrap_or_default(),
                        subject: request.subject.clone(),
                        body: render(&request.body, &ctx),
                        attachment: None,
                    },
                    campaign_id: None,
                })
                .await?;

            results.push(BulkItemResult {
                customer_id,
                log_id: Some(log.id),
                status: log.status().as_str().to_string(),
                error: log.error_reason.clone(),
            });
        }
        Ok(results)
    }

    fn register_run(&self, campaign_id: DbId) -> CancellationToken {
        let token = CancellationToken::new();
        self.run_tokens
            .lock()
            .unwrap()
            .insert(campaign_id, token.clone());
        token
    }

    async fn require_campaign(&self, campaign_id: DbId) -> Result<Campaign, NotifyError> {
        self.store
            .campaign_by_id(campaign_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "Campaign",
                    id: campaign_id,
                }
                .into()
            })
    }
}

/// The address a channel delivers to, if the customer has one on file.
fn address_for(customer: &Customer, channel: Channel) -> Option<String> {
    match channel {
        Channel::Whatsapp => customer.phone.clone(),
        Channel::Email => customer.email.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_thresholds() {
        let policy = DispatchPolicy::default();
        assert!(!policy.queues_campaign(50));
        assert!(policy.queues_campaign(51));
        assert!(policy.bulk_runs_inline(10));
        assert!(!policy.bulk_runs_inline(11));
    }

    #[test]
    fn address_follows_channel() {
        let customer = Customer {
            id: 1,
            name: "Ada".into(),
            email: Some("ada@example.com".into()),
            phone: None,
            is_lead: true,
            created_at: Utc::now(),
        };
        assert_eq!(
            address_for(&customer, Channel::Email).as_deref(),
            Some("ada@example.com")
        );
        assert_eq!(address_for(&customer, Channel::Whatsapp), None);
    }
}
