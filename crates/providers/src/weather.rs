//! Current weather by city (OpenWeatherMap `/data/2.5/weather`).
//!
//! Widget parameters:
//! - `city` (required) -- city name, optionally `,<country code>`.
//! - `units` (optional, default `metric`).

use std::time::Duration;

use async_trait::async_trait;
use doshboard_core::fetch::FetchError;
use doshboard_core::types::NormalizedValue;
use doshboard_core::widget::{WidgetConfig, WidgetType};
use serde::Deserialize;

use crate::adapter::ProviderAdapter;
use crate::config::ProviderEndpoint;
use crate::http::{build_client, get_json, required};

const DEFAULT_UNITS: &str = "metric";

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    name: String,
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    #[serde(default)]
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
    #[serde(default)]
    icon: Option<String>,
}

pub struct WeatherAdapter {
    client: reqwest::Client,
    endpoint: ProviderEndpoint,
}

impl WeatherAdapter {
    pub fn new(endpoint: ProviderEndpoint) -> Self {
        Self {
            client: build_client(endpoint.timeout),
            endpoint,
        }
    }
}

#[async_trait]
impl ProviderAdapter for WeatherAdapter {
    fn widget_type(&self) -> WidgetType {
        WidgetType::Weather
    }

    fn timeout(&self) -> Duration {
        self.endpoint.timeout
    }

    async fn fetch(&self, config: &WidgetConfig) -> Result<NormalizedValue, FetchError> {
        let city = required(config, "city")?;
        let units = config.param("units").unwrap_or(DEFAULT_UNITS);

        let request = self
            .client
            .get(format!("{}/data/2.5/weather", self.endpoint.base_url))
            .query(&[
                ("q", city),
                ("appid", self.endpoint.api_key.as_str()),
                ("units", units),
            ]);

        let current: CurrentWeather = get_json(request).await?;
        let condition = current.weather.into_iter().next();

        Ok(serde_json::json!({
            "city": current.name,
            "units": units,
            "temperature": current.main.temp,
            "humidity": current.main.humidity,
            "description": condition.as_ref().map(|c| c.description.clone()),
            "icon": condition.and_then(|c| c.icon),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn widget(city: &str) -> WidgetConfig {
        WidgetConfig {
            widget_id: 2,
            owner_id: 1,
            widget_type: WidgetType::Weather,
            params: BTreeMap::from([("city".to_string(), city.to_string())]),
            refresh_interval_secs: 600,
        }
    }

    #[tokio::test]
    async fn fetch_normalizes_current_weather() {
        let server = MockServer::start().await;
        let adapter = WeatherAdapter::new(ProviderEndpoint::new(server.uri(), "owm-key"));

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Rennes"))
            .and(query_param("appid", "owm-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Rennes",
                "main": { "temp": 14.2, "humidity": 81 },
                "weather": [{ "description": "light rain", "icon": "10d" }]
            })))
            .mount(&server)
            .await;

        let value = adapter.fetch(&widget("Rennes")).await.expect("fetch should succeed");

        assert_eq!(value["city"], "Rennes");
        assert_eq!(value["temperature"], 14.2);
        assert_eq!(value["humidity"], 81.0);
        assert_eq!(value["description"], "light rain");
        assert_eq!(value["units"], "metric");
    }

    #[tokio::test]
    async fn unknown_city_is_invalid_config() {
        let server = MockServer::start().await;
        let adapter = WeatherAdapter::new(ProviderEndpoint::new(server.uri(), "owm-key"));

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&server)
            .await;

        assert_matches!(
            adapter.fetch(&widget("Atlantis")).await,
            Err(FetchError::InvalidConfig(_))
        );
    }

    #[tokio::test]
    async fn server_error_is_unreachable() {
        let server = MockServer::start().await;
        let adapter = WeatherAdapter::new(ProviderEndpoint::new(server.uri(), "owm-key"));

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert_matches!(
            adapter.fetch(&widget("Rennes")).await,
            Err(FetchError::Unreachable(_))
        );
    }
}
