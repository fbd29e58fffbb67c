//! Repository for the `campaigns` table.
//!
//! Counter mutations are single atomic increments guarded by the counter
//! invariants (`sent + failed <= total`, `read <= delivered <= sent`), so
//! a racing webhook and dispatch completion cannot produce a lost update
//! or an impossible counter state. Status moves are compare-and-set on
//! the current status id.

use chrono::{DateTime, Utc};
use meridian_core::status::{CampaignStatus, StatusId};
use meridian_core::types::DbId;
use sqlx::PgPool;

use crate::models::campaign::{Campaign, CreateCampaign};

/// Column list for `campaigns` queries.
const COLUMNS: &str = "id, name, message_template, channel, status_id, target_criteria, \
     scheduled_at, messages_per_minute, total_leads, sent_count, delivered_count, \
     read_count, failed_count, created_at, updated_at";

/// CRUD, lifecycle, and counter operations for campaigns.
pub struct CampaignRepo;

impl CampaignRepo {
    /// Insert a new campaign in the given initial status
    /// (`draft` or `scheduled`).
    pub async fn create(
        pool: &PgPool,
        input: &CreateCampaign,
        initial_status: CampaignStatus,
    ) -> Result<Campaign, sqlx::Error> {
        let query = format!(
            "INSERT INTO campaigns \
                (name, message_template, channel, status_id, target_criteria, \
                 scheduled_at, messages_per_minute) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(&input.name)
            .bind(&input.message_template)
            .bind(&input.channel)
            .bind(initial_status.id())
            .bind(&input.target_criteria)
            .bind(input.scheduled_at)
            .bind(input.messages_per_minute)
            .fetch_one(pool)
            .await
    }

    /// Find a campaign by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM campaigns WHERE id = $1");
        sqlx::query_as::<_, Campaign>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Compare-and-set status move. Returns `true` when the campaign was
    /// in `from` and is now in `to`.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns \
             SET status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(from.id())
        .bind(to.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel from any of the given non-terminal statuses.
    pub async fn cancel(
        pool: &PgPool,
        id: DbId,
        cancellable_from: &[StatusId],
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns \
             SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = ANY($3)",
        )
        .bind(id)
        .bind(CampaignStatus::Cancelled.id())
        .bind(cancellable_from)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the expanded recipient count at execution start.
    pub async fn set_total_leads(pool: &PgPool, id: DbId, total: i32) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE campaigns SET total_leads = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(total)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Count one send success. Bounded by `sent + failed < total`.
    pub async fn increment_sent(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns \
             SET sent_count = sent_count + 1, updated_at = NOW() \
             WHERE id = $1 AND sent_count + failed_count < total_leads",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count one send failure. Bounded by `sent + failed < total`.
    pub async fn increment_failed(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns \
             SET failed_count = failed_count + 1, updated_at = NOW() \
             WHERE id = $1 AND sent_count + failed_count < total_leads",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// A successful retry converts one failure into one success in a
    /// single statement, so the invariant holds at every instant.
    pub async fn shift_failed_to_sent(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns \
             SET sent_count = sent_count + 1, failed_count = failed_count - 1, \
                 updated_at = NOW() \
             WHERE id = $1 AND failed_count > 0",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count one delivery confirmation. Bounded by `delivered < sent`.
    pub async fn increment_delivered(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns \
             SET delivered_count = delivered_count + 1, updated_at = NOW() \
             WHERE id = $1 AND delivered_count < sent_count",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count one read confirmation. Bounded by `read < delivered`.
    pub async fn increment_read(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns \
             SET read_count = read_count + 1, updated_at = NOW() \
             WHERE id = $1 AND read_count < delivered_count",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Scheduled campaigns whose `scheduled_at` has passed.
    pub async fn list_due_scheduled(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM campaigns \
             WHERE status_id = $1 AND scheduled_at IS NOT NULL AND scheduled_at <= $2 \
             ORDER BY scheduled_at"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(CampaignStatus::Scheduled.id())
            .bind(now)
            .fetch_all(pool)
            .await
    }
}
