//! Quotation entity model.

use chrono::NaiveDate;
use meridian_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `quotations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Quotation {
    pub id: DbId,
    pub customer_id: DbId,
    pub quotation_number: String,
    pub vehicle_model: Option<String>,
    pub quoted_amount: f64,
    pub valid_until: NaiveDate,
    pub created_at: Timestamp,
}
