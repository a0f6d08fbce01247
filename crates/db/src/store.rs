//! The configuration store boundary.
//!
//! Everything downstream of configuration (scheduler, cache, hub) learns
//! about widgets through [`ConfigStore`]: point lookups for authorization,
//! a full listing at start-up, and a change feed that drives rescheduling.

use async_trait::async_trait;
use doshboard_core::types::{DbId, WidgetId};
use doshboard_core::widget::{NewWidget, WidgetConfig};
use tokio::sync::broadcast;

/// Default buffer capacity for the change feed.
const CHANGE_FEED_CAPACITY: usize = 256;

/// Errors raised by a [`ConfigStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Widget {0} not found")]
    NotFound(WidgetId),

    /// The stored row cannot be turned into a valid configuration.
    #[error("Widget {id} has a corrupt configuration: {reason}")]
    Corrupt { id: WidgetId, reason: String },

    /// The configuration violates a store constraint.
    #[error("Invalid widget configuration: {0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A notification that a widget's configuration changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    /// Created or modified. Carries the configuration as saved.
    Upserted(WidgetConfig),
    Deleted(WidgetId),
}

impl ConfigChange {
    pub fn widget_id(&self) -> WidgetId {
        match self {
            ConfigChange::Upserted(config) => config.widget_id,
            ConfigChange::Deleted(id) => *id,
        }
    }
}

/// Durable per-widget configuration.
///
/// Implementations must publish a [`ConfigChange`] for every successful
/// `create`, `save` and `delete`, after the write is durable.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load one widget's configuration.
    async fn load(&self, widget_id: WidgetId) -> Result<WidgetConfig, StoreError>;

    /// Every widget known to the store.
    async fn list_all(&self) -> Result<Vec<WidgetConfig>, StoreError>;

    /// Widgets belonging to a single user.
    async fn list_for_owner(&self, owner_id: DbId) -> Result<Vec<WidgetConfig>, StoreError>;

    /// Persist a new widget and assign its id.
    async fn create(&self, widget: NewWidget) -> Result<WidgetConfig, StoreError>;

    /// Overwrite the mutable fields of an existing widget.
    async fn save(&self, config: &WidgetConfig) -> Result<(), StoreError>;

    /// Remove a widget.
    async fn delete(&self, widget_id: WidgetId) -> Result<(), StoreError>;

    /// Subscribe to configuration changes made through this store.
    fn subscribe_changes(&self) -> broadcast::Receiver<ConfigChange>;

    /// Whether the backing storage is reachable.
    async fn health_check(&self) -> bool;
}

// ---------------------------------------------------------------------------
// ChangeFeed
// ---------------------------------------------------------------------------

/// Fan-out of [`ConfigChange`]s shared by the store implementations.
///
/// When the buffer is full the oldest changes are dropped and slow receivers
/// observe `RecvError::Lagged`; they are expected to resynchronise from
/// [`ConfigStore::list_all`].
pub(crate) struct ChangeFeed {
    sender: broadcast::Sender<ConfigChange>,
}

impl ChangeFeed {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { sender }
    }

    pub(crate) fn publish(&self, change: ConfigChange) {
        // A send error only means nobody is listening.
        let _ = self.sender.send(change);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ConfigChange> {
        self.sender.subscribe()
    }
}
