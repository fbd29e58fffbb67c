//! Repository for the `quotations` table.

use meridian_core::types::DbId;
use sqlx::PgPool;

use crate::models::quotation::Quotation;

/// Column list for `quotations` queries.
const COLUMNS: &str = "id, customer_id, quotation_number, vehicle_model, \
     quoted_amount, valid_until, created_at";

/// Read operations over quotations.
pub struct QuotationRepo;

impl QuotationRepo {
    /// Find a quotation by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Quotation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM quotations WHERE id = $1");
        sqlx::query_as::<_, Quotation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
