//! Delivery-status reconciliation.
//!
//! [`StatusReconciler`] applies provider webhook events to notification
//! logs and, for campaign sends, to the campaign counters. Transitions
//! are forward-only per the rank table in
//! [`DeliveryStatus`](meridian_core::status::DeliveryStatus), which makes
//! replayed webhooks no-ops: a counter is only touched when the log row
//! actually moved.

use std::sync::Arc;

use meridian_core::error::CoreError;
use meridian_core::status::DeliveryStatus;
use meridian_core::types::DbId;
use serde::Serialize;

use crate::error::NotifyError;
use crate::store::NotificationStore;

/// Extra fields a webhook may carry.
#[derive(Debug, Clone, Default)]
pub struct WebhookMeta {
    /// Provider message id, when the event carries one.
    pub provider_message_id: Option<String>,
    /// Failure/bounce reason for `failed` events.
    pub error_reason: Option<String>,
}

/// Result of applying one webhook event.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
    pub log_id: DbId,
    /// The log's status after application (canonical vocabulary).
    pub new_status: &'static str,
    /// Whether this event changed anything (false for replays and
    /// out-of-order regressions).
    pub changed: bool,
}

/// Applies webhook-reported delivery events to logs and campaigns.
pub struct StatusReconciler {
    store: Arc<dyn NotificationStore>,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Apply one provider status event to a log.
    ///
    /// `raw_status` is the provider vocabulary (`opened`, `bounced`, ...);
    /// it is canonicalised before touching state. Fails with
    /// [`CoreError::NotFound`] for unknown log ids and
    /// [`CoreError::Validation`] for unknown vocabulary. Idempotent:
    /// replaying an identical payload leaves logs and counters unchanged.
    pub async fn apply_webhook_status(
        &self,
        log_id: DbId,
        raw_status: &str,
        meta: WebhookMeta,
    ) -> Result<WebhookOutcome, NotifyError> {
        let canonical = DeliveryStatus::from_provider(raw_status).ok_or_else(|| {
            CoreError::Validation(format!("Unknown delivery status: {raw_status}"))
        })?;

        let log = self
            .store
            .log_by_id(log_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "NotificationLog",
                id: log_id,
            })?;
        let previous = log.status();

        let changed = if canonical == DeliveryStatus::Failed {
            let reason = meta
                .error_reason
                .as_deref()
                .unwrap_or("provider reported failure");
            self.store.mark_log_failed(log_id, reason).await?
        } else {
            self.store.advance_log_status(log_id, canonical).await?
        };

        if changed {
            tracing::info!(
                log_id,
                from = previous.as_str(),
                to = canonical.as_str(),
                "Delivery status advanced"
            );
            if let Some(campaign_id) = log.campaign_id {
                self.bump_campaign_counters(campaign_id, previous, canonical)
                    .await?;
            }
        } else {
            tracing::debug!(
                log_id,
                current = previous.as_str(),
                reported = canonical.as_str(),
                "Webhook ignored (replay or out-of-order)"
            );
        }

        let new_status = if changed { canonical } else { previous };
        Ok(WebhookOutcome {
            log_id,
            new_status: new_status.as_str(),
            changed,
        })
    }

    /// Update campaign counters for a transition that actually applied.
    ///
    /// A `read` that skips the `delivered` milestone implies delivery, so
    /// both counters move — keeping `read <= delivered` without waiting
    /// for a delivery event that may never arrive. `sent` and `failed`
    /// events never touch counters here: those are accounted at dispatch
    /// time.
    async fn bump_campaign_counters(
        &self,
        campaign_id: DbId,
        previous: DeliveryStatus,
        applied: DeliveryStatus,
    ) -> Result<(), NotifyError> {
        match applied {
            DeliveryStatus::Delivered => {
                if !self.store.increment_delivered(campaign_id).await? {
                    tracing::warn!(campaign_id, "Delivered counter at bound, increment skipped");
                }
            }
            DeliveryStatus::Read => {
                if previous.rank() < DeliveryStatus::Delivered.rank() {
                    self.store.increment_delivered(campaign_id).await?;
                }
                if !self.store.increment_read(campaign_id).await? {
                    tracing::warn!(campaign_id, "Read counter at bound, increment skipped");
                }
            }
            DeliveryStatus::Pending | DeliveryStatus::Sent | DeliveryStatus::Failed => {}
        }
        Ok(())
    }
}
