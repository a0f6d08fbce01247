//! Widget entity model.

use std::collections::BTreeMap;

use doshboard_core::types::{DbId, Timestamp};
use doshboard_core::widget::{WidgetConfig, WidgetType};
use serde::Serialize;
use sqlx::FromRow;

use crate::store::StoreError;

/// A row from the `widgets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WidgetRow {
    pub id: DbId,
    pub owner_id: DbId,
    pub widget_type: String,
    pub params: serde_json::Value,
    pub refresh_interval_secs: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<WidgetRow> for WidgetConfig {
    type Error = StoreError;

    fn try_from(row: WidgetRow) -> Result<Self, Self::Error> {
        let widget_type: WidgetType = row
            .widget_type
            .parse()
            .map_err(|_| StoreError::Corrupt {
                id: row.id,
                reason: format!("unknown widget_type '{}'", row.widget_type),
            })?;

        let params: BTreeMap<String, String> =
            serde_json::from_value(row.params).map_err(|e| StoreError::Corrupt {
                id: row.id,
                reason: format!("params is not a string map: {e}"),
            })?;

        let refresh_interval_secs =
            u64::try_from(row.refresh_interval_secs).map_err(|_| StoreError::Corrupt {
                id: row.id,
                reason: format!("negative refresh interval {}", row.refresh_interval_secs),
            })?;

        Ok(WidgetConfig {
            widget_id: row.id,
            owner_id: row.owner_id,
            widget_type,
            params,
            refresh_interval_secs,
        })
    }
}
