//! Repository for the `campaign_targets` link table.

use meridian_core::status::DeliveryStatus;
use meridian_core::types::DbId;
use sqlx::PgPool;

use crate::models::campaign::CampaignTarget;

/// Column list for `campaign_targets` queries.
const COLUMNS: &str = "id, campaign_id, lead_id, notification_log_id, created_at";

/// Operations over expanded campaign recipients.
pub struct CampaignTargetRepo;

impl CampaignTargetRepo {
    /// Create one target row per expanded lead, inside a transaction so a
    /// crash mid-expansion leaves no partial target list.
    pub async fn insert_many(
        pool: &PgPool,
        campaign_id: DbId,
        lead_ids: &[DbId],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        for lead_id in lead_ids {
            sqlx::query(
                "INSERT INTO campaign_targets (campaign_id, lead_id) VALUES ($1, $2)",
            )
            .bind(campaign_id)
            .bind(lead_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Attach the log row a target's send produced.
    pub async fn set_log(pool: &PgPool, target_id: DbId, log_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE campaign_targets SET notification_log_id = $2 WHERE id = $1",
        )
        .bind(target_id)
        .bind(log_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// All targets for a campaign, in enumeration (insertion) order.
    pub async fn list_for_campaign(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<CampaignTarget>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM campaign_targets WHERE campaign_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, CampaignTarget>(&query)
            .bind(campaign_id)
            .fetch_all(pool)
            .await
    }

    /// Targets not yet dispatched (no log attached); the work list a
    /// resumed campaign picks up.
    pub async fn list_pending(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<CampaignTarget>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM campaign_targets \
             WHERE campaign_id = $1 AND notification_log_id IS NULL \
             ORDER BY id"
        );
        sqlx::query_as::<_, CampaignTarget>(&query)
            .bind(campaign_id)
            .fetch_all(pool)
            .await
    }

    /// Log IDs of this campaign's failed sends (retry-failed work list).
    pub async fn failed_log_ids(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT l.id FROM campaign_targets t \
             JOIN notification_logs l ON l.id = t.notification_log_id \
             WHERE t.campaign_id = $1 AND l.status_id = $2 \
             ORDER BY l.id",
        )
        .bind(campaign_id)
        .bind(DeliveryStatus::Failed.id())
        .fetch_all(pool)
        .await
    }
}
