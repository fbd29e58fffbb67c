//! Customer entity model.

use meridian_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `customers` table.
///
/// Leads are customers flagged `is_lead = true`; campaign target
/// expansion draws from this table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Customer {
    pub id: DbId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_lead: bool,
    pub created_at: Timestamp,
}
