use std::sync::Arc;

use doshboard_db::ConfigStore;
use doshboard_providers::football::FootballAdapter;
use doshboard_providers::ProviderRegistry;
use doshboard_refresh::RefreshScheduler;

use crate::auth::AuthGate;
use crate::background::ConfigWatcher;
use crate::config::ServerConfig;
use crate::ws::SubscriptionHub;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Durable widget configuration.
    pub store: Arc<dyn ConfigStore>,
    /// Recurring refresh jobs, one per widget.
    pub scheduler: Arc<RefreshScheduler>,
    /// WebSocket subscriptions; owns the widget value cache.
    pub hub: Arc<SubscriptionHub>,
    /// Token validation for HTTP requests and WebSocket connections.
    pub auth: Arc<dyn AuthGate>,
    /// Read-through football lookups (competitions, teams).
    pub football: Arc<FootballAdapter>,
}

impl AppState {
    /// Wire the refresh pipeline: the hub owns the cache, the scheduler
    /// writes into it.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn ConfigStore>,
        registry: ProviderRegistry,
        auth: Arc<dyn AuthGate>,
    ) -> Self {
        let hub = SubscriptionHub::new(Arc::clone(&store), config.ws_outbound_capacity);
        let scheduler = Arc::new(RefreshScheduler::new(
            registry,
            Arc::clone(hub.cache()),
            config.backoff,
        ));
        let football = Arc::new(FootballAdapter::new(config.providers.football.clone()));

        Self {
            config: Arc::new(config),
            store,
            scheduler,
            hub,
            auth,
            football,
        }
    }

    /// A watcher that keeps this state's scheduler in step with its store.
    pub fn config_watcher(&self) -> ConfigWatcher {
        ConfigWatcher::new(
            Arc::clone(&self.store),
            Arc::clone(&self.scheduler),
            Arc::clone(&self.hub),
        )
    }
}
