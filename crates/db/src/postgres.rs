//! [`ConfigStore`] backed by the `widgets` table.
//!
//! The change feed only covers writes made through this process. Widgets
//! edited directly in the database are picked up on the next start-up.

use async_trait::async_trait;
use doshboard_core::types::{DbId, WidgetId};
use doshboard_core::widget::{NewWidget, WidgetConfig};
use tokio::sync::broadcast;

use crate::models::widget::WidgetRow;
use crate::repositories::WidgetRepo;
use crate::store::{ChangeFeed, ConfigChange, ConfigStore, StoreError};
use crate::DbPool;

pub struct PgConfigStore {
    pool: DbPool,
    changes: ChangeFeed,
}

impl PgConfigStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            changes: ChangeFeed::new(),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Convert a domain interval to the `INTEGER` column type.
fn interval_column(secs: u64) -> Result<i32, StoreError> {
    i32::try_from(secs).map_err(|_| StoreError::Invalid(format!("refresh interval {secs} too large")))
}

fn into_configs(rows: Vec<WidgetRow>) -> Result<Vec<WidgetConfig>, StoreError> {
    rows.into_iter().map(WidgetConfig::try_from).collect()
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn load(&self, widget_id: WidgetId) -> Result<WidgetConfig, StoreError> {
        let row = WidgetRepo::find_by_id(&self.pool, widget_id)
            .await?
            .ok_or(StoreError::NotFound(widget_id))?;
        WidgetConfig::try_from(row)
    }

    async fn list_all(&self) -> Result<Vec<WidgetConfig>, StoreError> {
        into_configs(WidgetRepo::list_all(&self.pool).await?)
    }

    async fn list_for_owner(&self, owner_id: DbId) -> Result<Vec<WidgetConfig>, StoreError> {
        into_configs(WidgetRepo::list_for_owner(&self.pool, owner_id).await?)
    }

    async fn create(&self, widget: NewWidget) -> Result<WidgetConfig, StoreError> {
        widget
            .validate()
            .map_err(|e| StoreError::Invalid(e.to_string()))?;

        let row = WidgetRepo::create(
            &self.pool,
            widget.owner_id,
            widget.widget_type,
            &widget.params,
            interval_column(widget.refresh_interval_secs)?,
        )
        .await?;
        let config = WidgetConfig::try_from(row)?;

        tracing::debug!(widget_id = config.widget_id, "Widget created");
        self.changes.publish(ConfigChange::Upserted(config.clone()));
        Ok(config)
    }

    async fn save(&self, config: &WidgetConfig) -> Result<(), StoreError> {
        let updated = WidgetRepo::update(
            &self.pool,
            config.widget_id,
            &config.params,
            interval_column(config.refresh_interval_secs)?,
        )
        .await?;
        if !updated {
            return Err(StoreError::NotFound(config.widget_id));
        }

        self.changes.publish(ConfigChange::Upserted(config.clone()));
        Ok(())
    }

    async fn delete(&self, widget_id: WidgetId) -> Result<(), StoreError> {
        if !WidgetRepo::delete(&self.pool, widget_id).await? {
            return Err(StoreError::NotFound(widget_id));
        }

        tracing::debug!(widget_id, "Widget deleted");
        self.changes.publish(ConfigChange::Deleted(widget_id));
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ConfigChange> {
        self.changes.subscribe()
    }

    async fn health_check(&self) -> bool {
        crate::health_check(&self.pool).await.is_ok()
    }
}
