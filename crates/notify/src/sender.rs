//! Attempt recording and retry.
//!
//! [`NotificationSender`] owns the write path of a single send: insert a
//! `pending` log row, invoke the transport under a timeout, and settle
//! the row as `sent` or `failed`. Transport failures are recovered here —
//! the caller reads the outcome off the returned log and a single
//! recipient failure never aborts a batch.

use std::sync::Arc;
use std::time::Duration;

use meridian_core::error::CoreError;
use meridian_core::status::DeliveryStatus;
use meridian_core::types::DbId;
use meridian_db::models::notification_log::{NewNotificationLog, NotificationLog};

use crate::error::{NotifyError, StoreError};
use crate::store::NotificationStore;
use crate::transport::{OutboundMessage, Transport, TransportError};

/// Default per-send transport timeout.
const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default attempt cap for new logs.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Sender tuning knobs.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Upper bound on a single transport call; expiry is recorded as a
    /// transport failure, not an indefinite hang.
    pub transport_timeout: Duration,
    /// `max_attempts` stamped onto new log rows.
    pub default_max_attempts: i32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            transport_timeout: DEFAULT_TRANSPORT_TIMEOUT,
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Everything needed to record one send attempt.
#[derive(Debug, Clone)]
pub struct AttemptSpec {
    pub notification_type_id: Option<DbId>,
    pub template_id: Option<DbId>,
    pub message: OutboundMessage,
    pub campaign_id: Option<DbId>,
}

/// Records send attempts and drives retries.
pub struct NotificationSender {
    store: Arc<dyn NotificationStore>,
    transport: Arc<dyn Transport>,
    config: SenderConfig,
}

impl NotificationSender {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        transport: Arc<dyn Transport>,
        config: SenderConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    /// Record one send attempt.
    ///
    /// Inserts a `pending` log, invokes the transport, and settles the
    /// row. The returned log reflects the outcome (`sent` with a provider
    /// message id, or `failed` with a reason). Only store failures error;
    /// transport failures do not.
    pub async fn record_attempt(&self, spec: AttemptSpec) -> Result<NotificationLog, NotifyError> {
        let log = self
            .store
            .insert_log(NewNotificationLog {
                notification_type_id: spec.notification_type_id,
                template_id: spec.template_id,
                channel: spec.message.channel.as_str().to_string(),
                recipient: spec.message.recipient.clone(),
                message_content: spec.message.body.clone(),
                max_attempts: self.config.default_max_attempts,
                campaign_id: spec.campaign_id,
            })
            .await?;

        self.deliver_and_settle(log.id, &spec.message).await?;
        self.refreshed(log.id).await
    }

    /// `true` iff the log is `failed` and under its attempt cap.
    pub fn can_retry(log: &NotificationLog) -> bool {
        log.status() == DeliveryStatus::Failed && log.attempt_count < log.max_attempts
    }

    /// Re-run a failed send as a new attempt on the same row.
    ///
    /// Bumps `attempt_count`, resets the row to `pending`, and re-sends
    /// the recorded content to the recorded recipient. Fails with
    /// [`CoreError::RetryNotAllowed`] when the log is not `failed` or the
    /// attempt cap is reached. A retry that ends `sent` shifts the owning
    /// campaign's counters `failed → sent`.
    pub async fn retry(&self, log_id: DbId) -> Result<NotificationLog, NotifyError> {
        let log = self
            .store
            .log_by_id(log_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "NotificationLog",
                id: log_id,
            })?;

        if !Self::can_retry(&log) {
            let reason = if log.status() != DeliveryStatus::Failed {
                format!("log {} is not in failed state", log.id)
            } else {
                format!(
                    "log {} has exhausted its {} attempts",
                    log.id, log.max_attempts
                )
            };
            return Err(CoreError::RetryNotAllowed(reason).into());
        }

        // The conditional update re-checks under the store's guard; a
        // concurrent retry losing the race lands here too.
        let admitted = self.store.begin_retry(log_id).await?;
        let log = admitted.ok_or_else(|| {
            CoreError::RetryNotAllowed(format!("log {log_id} is no longer retryable"))
        })?;

        let channel = meridian_core::channels::Channel::parse(&log.channel)
            .ok_or_else(|| StoreError::Internal(format!("log {log_id} has unknown channel")))?;
        let message = OutboundMessage {
            channel,
            recipient: log.recipient.clone(),
            subject: None,
            body: log.message_content.clone(),
            attachment: None,
        };

        let sent = self.deliver_and_settle(log.id, &message).await?;
        if sent {
            if let Some(campaign_id) = log.campaign_id {
                self.store.shift_failed_to_sent(campaign_id).await?;
            }
        }

        self.refreshed(log.id).await
    }

    /// Invoke the transport under the timeout and settle the log row.
    /// Returns whether the send succeeded.
    async fn deliver_and_settle(
        &self,
        log_id: DbId,
        message: &OutboundMessage,
    ) -> Result<bool, NotifyError> {
        let outcome =
            match tokio::time::timeout(self.config.transport_timeout, self.transport.send(message))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(self.config.transport_timeout)),
            };

        match outcome {
            Ok(receipt) => {
                self.store.mark_log_sent(log_id, &receipt.message_id).await?;
                tracing::info!(
                    log_id,
                    recipient = %message.recipient,
                    provider_message_id = %receipt.message_id,
                    "Notification sent"
                );
                Ok(true)
            }
            Err(e) => {
                let reason = e.to_string();
                self.store.mark_log_failed(log_id, &reason).await?;
                tracing::warn!(
                    log_id,
                    recipient = %message.recipient,
                    error = %reason,
                    "Notification send failed"
                );
                Ok(false)
            }
        }
    }

    async fn refreshed(&self, log_id: DbId) -> Result<NotificationLog, NotifyError> {
        self.store
            .log_by_id(log_id)
            .await?
            .ok_or_else(|| StoreError::Internal(format!("log {log_id} vanished mid-send")).into())
    }
}
