//! Process-local [`ConfigStore`] used when no database is configured.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use doshboard_core::types::{DbId, WidgetId};
use doshboard_core::widget::{NewWidget, WidgetConfig};
use tokio::sync::{broadcast, RwLock};

use crate::store::{ChangeFeed, ConfigChange, ConfigStore, StoreError};

/// Keeps widget configurations in memory. Contents are lost on restart.
pub struct InMemoryConfigStore {
    widgets: RwLock<BTreeMap<WidgetId, WidgetConfig>>,
    next_id: AtomicI64,
    changes: ChangeFeed,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self {
            widgets: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            changes: ChangeFeed::new(),
        }
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn load(&self, widget_id: WidgetId) -> Result<WidgetConfig, StoreError> {
        self.widgets
            .read()
            .await
            .get(&widget_id)
            .cloned()
            .ok_or(StoreError::NotFound(widget_id))
    }

    async fn list_all(&self) -> Result<Vec<WidgetConfig>, StoreError> {
        Ok(self.widgets.read().await.values().cloned().collect())
    }

    async fn list_for_owner(&self, owner_id: DbId) -> Result<Vec<WidgetConfig>, StoreError> {
        Ok(self
            .widgets
            .read()
            .await
            .values()
            .filter(|w| w.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn create(&self, widget: NewWidget) -> Result<WidgetConfig, StoreError> {
        widget
            .validate()
            .map_err(|e| StoreError::Invalid(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let config = widget.into_config(id);
        self.widgets.write().await.insert(id, config.clone());

        self.changes.publish(ConfigChange::Upserted(config.clone()));
        Ok(config)
    }

    async fn save(&self, config: &WidgetConfig) -> Result<(), StoreError> {
        {
            let mut widgets = self.widgets.write().await;
            let existing = widgets
                .get_mut(&config.widget_id)
                .ok_or(StoreError::NotFound(config.widget_id))?;
            if existing.owner_id != config.owner_id || existing.widget_type != config.widget_type {
                return Err(StoreError::Invalid(
                    "owner and widget type cannot change".to_string(),
                ));
            }
            existing.params = config.params.clone();
            existing.refresh_interval_secs = config.refresh_interval_secs;
        }

        self.changes.publish(ConfigChange::Upserted(config.clone()));
        Ok(())
    }

    async fn delete(&self, widget_id: WidgetId) -> Result<(), StoreError> {
        self.widgets
            .write()
            .await
            .remove(&widget_id)
            .ok_or(StoreError::NotFound(widget_id))?;

        self.changes.publish(ConfigChange::Deleted(widget_id));
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ConfigChange> {
        self.changes.subscribe()
    }

    async fn health_check(&self) -> bool {
        true
    }
}
