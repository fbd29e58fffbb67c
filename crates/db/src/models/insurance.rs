//! Insurance policy entity model.

use chrono::NaiveDate;
use meridian_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `insurances` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Insurance {
    pub id: DbId,
    pub customer_id: DbId,
    pub policy_number: String,
    pub policy_type: String,
    pub company: String,
    pub premium_amount: f64,
    pub start_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub created_at: Timestamp,
}
