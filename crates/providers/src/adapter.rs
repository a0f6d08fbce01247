//! The provider capability and its dispatch table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use doshboard_core::fetch::FetchError;
use doshboard_core::types::NormalizedValue;
use doshboard_core::widget::{WidgetConfig, WidgetType};

use crate::config::ProviderSettings;
use crate::crypto::CryptoAdapter;
use crate::football::FootballAdapter;
use crate::weather::WeatherAdapter;

/// Translates one widget configuration into one external call.
///
/// Implementations must be safe to call concurrently for different widgets
/// of the same type and must not retry internally.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The widget type this adapter serves.
    fn widget_type(&self) -> WidgetType;

    /// Upper bound on a single [`fetch`](ProviderAdapter::fetch).
    fn timeout(&self) -> Duration;

    /// Fetch and normalize the current value for `config`.
    async fn fetch(&self, config: &WidgetConfig) -> Result<NormalizedValue, FetchError>;
}

/// Run `adapter.fetch` under the adapter's own time bound.
///
/// An elapsed bound is reported as [`FetchError::Timeout`].
pub async fn fetch_bounded(
    adapter: &dyn ProviderAdapter,
    config: &WidgetConfig,
) -> Result<NormalizedValue, FetchError> {
    match tokio::time::timeout(adapter.timeout(), adapter.fetch(config)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    }
}

/// Maps each [`WidgetType`] to the adapter that serves it.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<WidgetType, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry with every built-in adapter.
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CryptoAdapter::new(settings.crypto.clone())));
        registry.register(Arc::new(WeatherAdapter::new(settings.weather.clone())));
        registry.register(Arc::new(FootballAdapter::new(settings.football.clone())));
        registry
    }

    /// Install `adapter` for its widget type, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.widget_type(), adapter);
    }

    pub fn get(&self, widget_type: WidgetType) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&widget_type).cloned()
    }

    pub fn supports(&self, widget_type: WidgetType) -> bool {
        self.adapters.contains_key(&widget_type)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;

    use super::*;

    struct SlowAdapter;

    #[async_trait]
    impl ProviderAdapter for SlowAdapter {
        fn widget_type(&self) -> WidgetType {
            WidgetType::Weather
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(50)
        }

        async fn fetch(&self, _config: &WidgetConfig) -> Result<NormalizedValue, FetchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(serde_json::json!({}))
        }
    }

    fn config() -> WidgetConfig {
        WidgetConfig {
            widget_id: 1,
            owner_id: 1,
            widget_type: WidgetType::Weather,
            params: BTreeMap::new(),
            refresh_interval_secs: 60,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_bounded_reports_timeout() {
        let result = fetch_bounded(&SlowAdapter, &config()).await;
        assert_matches!(result, Err(FetchError::Timeout));
    }

    #[test]
    fn registry_dispatches_by_widget_type() {
        let mut registry = ProviderRegistry::new();
        assert!(!registry.supports(WidgetType::Weather));

        registry.register(Arc::new(SlowAdapter));

        assert!(registry.supports(WidgetType::Weather));
        assert!(registry.get(WidgetType::Crypto).is_none());
        let adapter = registry.get(WidgetType::Weather).expect("adapter registered");
        assert_eq!(adapter.widget_type(), WidgetType::Weather);
    }

    #[test]
    fn built_in_registry_covers_every_type() {
        let registry = ProviderRegistry::from_settings(&ProviderSettings::default());
        for t in WidgetType::ALL {
            assert!(registry.supports(t), "{t} has no adapter");
        }
    }
}
