//! Repository for the `message_templates` and `notification_types` tables.

use meridian_core::types::DbId;
use sqlx::PgPool;

use crate::models::template::{CreateTemplate, MessageTemplate, NotificationType, UpdateTemplate};

/// Column list for `message_templates` queries.
const COLUMNS: &str = "id, notification_type_id, channel, subject, body, \
     declared_variables, is_active, created_at, updated_at";

/// Column list for `notification_types` queries.
const TYPE_COLUMNS: &str = "id, category, name, is_active";

/// CRUD operations for message templates and their type catalogue.
pub struct TemplateRepo;

impl TemplateRepo {
    /// Insert a new template, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateTemplate,
    ) -> Result<MessageTemplate, sqlx::Error> {
        let query = format!(
            "INSERT INTO message_templates \
                (notification_type_id, channel, subject, body, declared_variables) \
             VALUES ($1, $2, $3, $4, COALESCE($5, '[]'::jsonb)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MessageTemplate>(&query)
            .bind(input.notification_type_id)
            .bind(&input.channel)
            .bind(&input.subject)
            .bind(&input.body)
            .bind(&input.declared_variables)
            .fetch_one(pool)
            .await
    }

    /// Find a template by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<MessageTemplate>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM message_templates WHERE id = $1");
        sqlx::query_as::<_, MessageTemplate>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List templates, optionally restricted to a notification type and/or
    /// active-only.
    pub async fn list(
        pool: &PgPool,
        notification_type_id: Option<DbId>,
        active_only: bool,
    ) -> Result<Vec<MessageTemplate>, sqlx::Error> {
        let mut filters = Vec::new();
        if notification_type_id.is_some() {
            filters.push("notification_type_id = $1");
        }
        if active_only {
            filters.push("is_active = true");
        }
        let where_clause = if filters.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", filters.join(" AND "))
        };
        let query = format!(
            "SELECT {COLUMNS} FROM message_templates {where_clause} ORDER BY id"
        );
        let mut q = sqlx::query_as::<_, MessageTemplate>(&query);
        if let Some(type_id) = notification_type_id {
            q = q.bind(type_id);
        }
        q.fetch_all(pool).await
    }

    /// Patch a template. Unset DTO fields keep their current values.
    ///
    /// Returns the updated row, or `None` if the template does not exist.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTemplate,
    ) -> Result<Option<MessageTemplate>, sqlx::Error> {
        let query = format!(
            "UPDATE message_templates SET \
                channel = COALESCE($2, channel), \
                subject = COALESCE($3, subject), \
                body = COALESCE($4, body), \
                declared_variables = COALESCE($5, declared_variables), \
                is_active = COALESCE($6, is_active), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MessageTemplate>(&query)
            .bind(id)
            .bind(&input.channel)
            .bind(&input.subject)
            .bind(&input.body)
            .bind(&input.declared_variables)
            .bind(input.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Soft-invalidate a template (never hard-deleted while referenced).
    ///
    /// Returns `true` if the template was found and deactivated.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE message_templates \
             SET is_active = false, updated_at = NOW() \
             WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List the notification type catalogue.
    pub async fn list_types(
        pool: &PgPool,
        active_only: bool,
    ) -> Result<Vec<NotificationType>, sqlx::Error> {
        let filter = if active_only {
            "WHERE is_active = true"
        } else {
            ""
        };
        let query = format!(
            "SELECT {TYPE_COLUMNS} FROM notification_types {filter} ORDER BY category, name"
        );
        sqlx::query_as::<_, NotificationType>(&query)
            .fetch_all(pool)
            .await
    }

    /// Find a notification type by ID.
    pub async fn find_type_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<NotificationType>, sqlx::Error> {
        let query = format!("SELECT {TYPE_COLUMNS} FROM notification_types WHERE id = $1");
        sqlx::query_as::<_, NotificationType>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
