//! Real-time crypto ticker (nomics-style `/v1/currencies/ticker`).
//!
//! Widget parameters:
//! - `currency` (required) -- ticker id, e.g. `BTC`.
//! - `convert` (optional, default `USD`) -- quote currency.

use std::time::Duration;

use async_trait::async_trait;
use doshboard_core::fetch::FetchError;
use doshboard_core::types::NormalizedValue;
use doshboard_core::widget::{WidgetConfig, WidgetType};
use serde::Deserialize;

use crate::adapter::ProviderAdapter;
use crate::config::ProviderEndpoint;
use crate::http::{build_client, get_json, lenient_f64, required};

const DEFAULT_CONVERT: &str = "USD";

/// One entry of the ticker listing. Only the fields we surface are decoded.
#[derive(Debug, Deserialize)]
struct TickerEntry {
    currency: String,
    #[serde(default)]
    logo_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    rank: Option<f64>,
    #[serde(default, rename = "1d")]
    one_day: Option<TickerInterval>,
}

#[derive(Debug, Deserialize)]
struct TickerInterval {
    #[serde(default, deserialize_with = "lenient_f64")]
    price_change_pct: Option<f64>,
}

pub struct CryptoAdapter {
    client: reqwest::Client,
    endpoint: ProviderEndpoint,
}

impl CryptoAdapter {
    pub fn new(endpoint: ProviderEndpoint) -> Self {
        Self {
            client: build_client(endpoint.timeout),
            endpoint,
        }
    }
}

fn normalize(entry: TickerEntry, convert: &str) -> Result<NormalizedValue, FetchError> {
    let price = entry
        .price
        .ok_or_else(|| FetchError::Unreachable("ticker entry has no price".into()))?;

    Ok(serde_json::json!({
        "currency": entry.currency,
        "convert": convert,
        "logo_url": entry.logo_url,
        "price": price,
        "price_change_pct_1d": entry.one_day.and_then(|d| d.price_change_pct).unwrap_or(0.0),
        "rank": entry.rank.map(|r| r as i64),
    }))
}

#[async_trait]
impl ProviderAdapter for CryptoAdapter {
    fn widget_type(&self) -> WidgetType {
        WidgetType::Crypto
    }

    fn timeout(&self) -> Duration {
        self.endpoint.timeout
    }

    async fn fetch(&self, config: &WidgetConfig) -> Result<NormalizedValue, FetchError> {
        let currency = required(config, "currency")?;
        let convert = config.param("convert").unwrap_or(DEFAULT_CONVERT);

        let request = self
            .client
            .get(format!("{}/v1/currencies/ticker", self.endpoint.base_url))
            .query(&[
                ("key", self.endpoint.api_key.as_str()),
                ("ids", currency),
                ("convert", convert),
            ]);

        let listing: Vec<TickerEntry> = get_json(request).await?;
        let entry = listing
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::InvalidConfig(format!("unknown currency '{currency}'")))?;

        normalize(entry, convert)
    }
}
