//! Repository for the `notification_logs` table.
//!
//! Status moves are single conditional statements guarded by the set of
//! allowed source statuses, so concurrent webhook deliveries and the
//! dispatch loop can never regress a row or apply the same transition
//! twice.

use chrono::{DateTime, Utc};
use meridian_core::status::{DeliveryStatus, StatusId};
use meridian_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification_log::{NewNotificationLog, NotificationLog};

/// Column list for `notification_logs` queries.
const COLUMNS: &str = "id, notification_type_id, template_id, channel, recipient, \
     message_content, status_id, attempt_count, max_attempts, campaign_id, \
     provider_message_id, error_reason, created_at, updated_at";

/// CRUD and state-machine operations for notification logs.
pub struct NotificationLogRepo;

impl NotificationLogRepo {
    /// Insert a new log row with status `pending` and attempt count 1.
    pub async fn insert(
        pool: &PgPool,
        new: &NewNotificationLog,
    ) -> Result<NotificationLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_logs \
                (notification_type_id, template_id, channel, recipient, \
                 message_content, status_id, attempt_count, max_attempts, campaign_id) \
             VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(new.notification_type_id)
            .bind(new.template_id)
            .bind(&new.channel)
            .bind(&new.recipient)
            .bind(&new.message_content)
            .bind(DeliveryStatus::Pending.id())
            .bind(new.max_attempts)
            .bind(new.campaign_id)
            .fetch_one(pool)
            .await
    }

    /// Find a log by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<NotificationLog>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notification_logs WHERE id = $1");
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Advance a log to `to` if its current status is one of
    /// `allowed_from`. Returns `true` when the transition applied.
    pub async fn advance_status(
        pool: &PgPool,
        id: DbId,
        to: DeliveryStatus,
        allowed_from: &[StatusId],
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_logs \
             SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($3)",
        )
        .bind(id)
        .bind(to.id())
        .bind(allowed_from)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a pending log `sent`, recording the provider's message id.
    ///
    /// No-ops (returning `false`) if a webhook already advanced the row
    /// past `pending`.
    pub async fn mark_sent(
        pool: &PgPool,
        id: DbId,
        provider_message_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_logs \
             SET status_id = $2, provider_message_id = $3, error_reason = NULL, \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(DeliveryStatus::Sent.id())
        .bind(provider_message_id)
        .bind(DeliveryStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a log `failed` with a reason (allowed from `pending`/`sent`).
    pub async fn mark_failed(pool: &PgPool, id: DbId, reason: &str) -> Result<bool, sqlx::Error> {
        let allowed = [DeliveryStatus::Pending.id(), DeliveryStatus::Sent.id()];
        let result = sqlx::query(
            "UPDATE notification_logs \
             SET status_id = $2, error_reason = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($4)",
        )
        .bind(id)
        .bind(DeliveryStatus::Failed.id())
        .bind(reason)
        .bind(&allowed[..])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Begin a retry attempt: bump `attempt_count` and reset the row to
    /// `pending` in one statement, only while the row is `failed` and
    /// under its attempt cap. Returns the refreshed row when the retry
    /// was admitted.
    pub async fn begin_retry(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<NotificationLog>, sqlx::Error> {
        let query = format!(
            "UPDATE notification_logs \
             SET status_id = $2, attempt_count = attempt_count + 1, \
                 error_reason = NULL, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3 AND attempt_count < max_attempts \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(id)
            .bind(DeliveryStatus::Pending.id())
            .bind(DeliveryStatus::Failed.id())
            .fetch_optional(pool)
            .await
    }

    /// List the logs attached to a campaign.
    pub async fn list_for_campaign(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<NotificationLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_logs \
             WHERE campaign_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(campaign_id)
            .fetch_all(pool)
            .await
    }

    /// Irreversibly delete logs older than `cutoff`, skipping any log
    /// attached to a campaign that has not reached a terminal state.
    /// Returns the number of rows removed.
    pub async fn archive_older_than(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
        terminal_campaign_statuses: &[StatusId],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM notification_logs \
             WHERE created_at < $1 \
               AND (campaign_id IS NULL OR campaign_id IN \
                    (SELECT id FROM campaigns WHERE status_id = ANY($2)))",
        )
        .bind(cutoff)
        .bind(terminal_campaign_statuses)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
