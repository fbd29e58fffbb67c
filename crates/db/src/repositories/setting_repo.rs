//! Repository for the `settings` table.

use sqlx::PgPool;

use crate::models::setting::Setting;

/// Column list for `settings` queries.
const COLUMNS: &str = "id, category, key, value";

/// Read operations over structured settings.
pub struct SettingRepo;

impl SettingRepo {
    /// Load the full settings table for a per-render snapshot.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Setting>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM settings ORDER BY category, key");
        sqlx::query_as::<_, Setting>(&query).fetch_all(pool).await
    }
}
