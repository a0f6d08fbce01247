//! Repository for the `widgets` table.

use std::collections::BTreeMap;

use doshboard_core::types::{DbId, WidgetId};
use doshboard_core::widget::WidgetType;
use sqlx::PgPool;

use crate::models::widget::WidgetRow;

/// Column list for `widgets` queries.
const COLUMNS: &str =
    "id, owner_id, widget_type, params, refresh_interval_secs, created_at, updated_at";

/// Provides CRUD operations for widgets.
pub struct WidgetRepo;

impl WidgetRepo {
    /// Insert a widget, returning the created row.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        widget_type: WidgetType,
        params: &BTreeMap<String, String>,
        refresh_interval_secs: i32,
    ) -> Result<WidgetRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO widgets (owner_id, widget_type, params, refresh_interval_secs) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WidgetRow>(&query)
            .bind(owner_id)
            .bind(widget_type.as_str())
            .bind(sqlx::types::Json(params))
            .bind(refresh_interval_secs)
            .fetch_one(pool)
            .await
    }

    /// Find a widget by id.
    pub async fn find_by_id(pool: &PgPool, id: WidgetId) -> Result<Option<WidgetRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM widgets WHERE id = $1");
        sqlx::query_as::<_, WidgetRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List every widget, oldest first.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<WidgetRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM widgets ORDER BY id");
        sqlx::query_as::<_, WidgetRow>(&query).fetch_all(pool).await
    }

    /// List the widgets belonging to one user.
    pub async fn list_for_owner(pool: &PgPool, owner_id: DbId) -> Result<Vec<WidgetRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM widgets WHERE owner_id = $1 ORDER BY id");
        sqlx::query_as::<_, WidgetRow>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Overwrite the mutable columns of a widget.
    ///
    /// Returns `false` if no widget with the given id exists.
    pub async fn update(
        pool: &PgPool,
        id: WidgetId,
        params: &BTreeMap<String, String>,
        refresh_interval_secs: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE widgets \
             SET params = $2, refresh_interval_secs = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(sqlx::types::Json(params))
        .bind(refresh_interval_secs)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a widget. Returns `false` if it did not exist.
    pub async fn delete(pool: &PgPool, id: WidgetId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM widgets WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
