//! Keeps the refresh scheduler in step with the configuration store.
//!
//! [`ConfigWatcher`] consumes the store's change feed: an upserted widget is
//! registered or re-configured, a deleted one is unregistered, evicted from
//! the cache and dropped from the hub.

use std::collections::HashSet;
use std::sync::Arc;

use doshboard_core::types::WidgetId;
use doshboard_core::widget::WidgetConfig;
use doshboard_db::{ConfigChange, ConfigStore, StoreError};
use doshboard_refresh::{RefreshScheduler, ScheduleError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::ws::SubscriptionHub;

pub struct ConfigWatcher {
    store: Arc<dyn ConfigStore>,
    scheduler: Arc<RefreshScheduler>,
    hub: Arc<SubscriptionHub>,
}

impl ConfigWatcher {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        scheduler: Arc<RefreshScheduler>,
        hub: Arc<SubscriptionHub>,
    ) -> Self {
        Self {
            store,
            scheduler,
            hub,
        }
    }

    /// Make the scheduler match the store: schedule every stored widget and
    /// retire jobs whose widget no longer exists. Returns the number of
    /// stored widgets.
    pub async fn sync_all(&self) -> Result<usize, StoreError> {
        let configs = self.store.list_all().await?;
        let stored: HashSet<WidgetId> = configs.iter().map(|c| c.widget_id).collect();

        for widget_id in self.scheduler.widget_ids().await {
            if !stored.contains(&widget_id) {
                self.remove(widget_id).await;
            }
        }

        let count = configs.len();
        for config in configs {
            self.upsert(config).await;
        }

        tracing::info!(widgets = count, "Refresh jobs synchronised with configuration store");
        Ok(count)
    }

    /// Apply changes until the feed closes or `cancel` fires.
    ///
    /// Take the receiver before calling [`sync_all`](Self::sync_all) so no
    /// change made in between is lost.
    pub async fn run(self, mut changes: broadcast::Receiver<ConfigChange>, cancel: CancellationToken) {
        tracing::info!("Config watcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Config watcher shutting down");
                    break;
                }
                received = changes.recv() => match received {
                    Ok(change) => self.apply(change).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Config watcher lagged, resynchronising");
                        if let Err(e) = self.sync_all().await {
                            tracing::error!(error = %e, "Failed to resynchronise refresh jobs");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Configuration feed closed, config watcher shutting down");
                        break;
                    }
                },
            }
        }
    }

    pub async fn apply(&self, change: ConfigChange) {
        match change {
            ConfigChange::Upserted(config) => self.upsert(config).await,
            ConfigChange::Deleted(widget_id) => self.remove(widget_id).await,
        }
    }

    async fn upsert(&self, config: WidgetConfig) {
        let widget_id = config.widget_id;
        let result = match self.scheduler.update_config(config.clone()).await {
            Err(ScheduleError::NotRegistered(_)) => self.scheduler.register(config).await.map(|()| true),
            other => other,
        };

        if let Err(e) = result {
            tracing::warn!(widget_id, error = %e, "Failed to schedule widget");
        }
    }

    async fn remove(&self, widget_id: WidgetId) {
        match self.scheduler.unregister(widget_id).await {
            Ok(()) | Err(ScheduleError::NotRegistered(_)) => {}
            Err(e) => tracing::warn!(widget_id, error = %e, "Failed to unregister widget"),
        }
        self.hub.cache().remove(widget_id);
        self.hub.drop_widget(widget_id);
    }
}
