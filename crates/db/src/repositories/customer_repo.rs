//! Repository for the `customers` table.

use meridian_core::types::DbId;
use sqlx::PgPool;

use crate::models::customer::Customer;

/// Column list for `customers` queries.
const COLUMNS: &str = "id, name, email, phone, is_lead, created_at";

/// Read operations over customers and leads.
pub struct CustomerRepo;

impl CustomerRepo {
    /// Find a customer by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Customer>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM customers WHERE id = $1");
        sqlx::query_as::<_, Customer>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the customers with the given IDs, preserving no particular order.
    pub async fn list_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<Customer>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM customers WHERE id = ANY($1) ORDER BY id");
        sqlx::query_as::<_, Customer>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// List all leads (campaign target expansion).
    pub async fn list_leads(pool: &PgPool) -> Result<Vec<Customer>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM customers WHERE is_lead = true ORDER BY id");
        sqlx::query_as::<_, Customer>(&query).fetch_all(pool).await
    }

    /// List every customer (campaign target expansion).
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Customer>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM customers ORDER BY id");
        sqlx::query_as::<_, Customer>(&query).fetch_all(pool).await
    }

    /// Pick one real customer at random (sample render context).
    pub async fn random(pool: &PgPool) -> Result<Option<Customer>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM customers ORDER BY RANDOM() LIMIT 1");
        sqlx::query_as::<_, Customer>(&query)
            .fetch_optional(pool)
            .await
    }
}
