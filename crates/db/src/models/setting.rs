//! Structured settings model.

use meridian_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `settings` table.
///
/// Keys are stored with their category prefix (`company_advisor_name` in
/// category `company`); the render-context builder strips the prefix when
/// flattening into the `category.key` snapshot.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Setting {
    pub id: DbId,
    pub category: String,
    pub key: String,
    pub value: String,
}
