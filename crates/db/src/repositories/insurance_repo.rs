//! Repository for the `insurances` table.

use meridian_core::types::DbId;
use sqlx::PgPool;

use crate::models::insurance::Insurance;

/// Column list for `insurances` queries.
const COLUMNS: &str = "id, customer_id, policy_number, policy_type, company, \
     premium_amount, start_date, expiry_date, created_at";

/// Read operations over insurance policies.
pub struct InsuranceRepo;

impl InsuranceRepo {
    /// Find a policy by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Insurance>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM insurances WHERE id = $1");
        sqlx::query_as::<_, Insurance>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The customer's most recently started policy, if any.
    pub async fn latest_for_customer(
        pool: &PgPool,
        customer_id: DbId,
    ) -> Result<Option<Insurance>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM insurances \
             WHERE customer_id = $1 \
             ORDER BY start_date DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Insurance>(&query)
            .bind(customer_id)
            .fetch_optional(pool)
            .await
    }
}
