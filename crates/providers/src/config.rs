//! Provider endpoints and credentials, loaded from the environment.

use std::time::Duration;

/// Default bound on a single provider call.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

const DEFAULT_CRYPTO_URL: &str = "https://api.nomics.com";
const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org";
const DEFAULT_FOOTBALL_URL: &str = "https://api.football-data.org";

/// Where and how to reach one provider.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    /// Scheme + host, without a trailing slash.
    pub base_url: String,
    /// API key; empty when the provider does not need one.
    pub api_key: String,
    pub timeout: Duration,
}

impl ProviderEndpoint {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Endpoints for every built-in provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub crypto: ProviderEndpoint,
    pub weather: ProviderEndpoint,
    pub football: ProviderEndpoint,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            crypto: ProviderEndpoint::new(DEFAULT_CRYPTO_URL, ""),
            weather: ProviderEndpoint::new(DEFAULT_WEATHER_URL, ""),
            football: ProviderEndpoint::new(DEFAULT_FOOTBALL_URL, ""),
        }
    }
}

impl ProviderSettings {
    /// Load provider settings from environment variables.
    ///
    /// | Env Var                 | Default                            |
    /// |-------------------------|------------------------------------|
    /// | `CRYPTO_API_URL`        | `https://api.nomics.com`           |
    /// | `CRYPTO_API_KEY`        | empty                              |
    /// | `WEATHER_API_URL`       | `https://api.openweathermap.org`   |
    /// | `WEATHER_API_KEY`       | empty                              |
    /// | `FOOTBALL_API_URL`      | `https://api.football-data.org`    |
    /// | `FOOTBALL_API_KEY`      | empty                              |
    /// | `PROVIDER_TIMEOUT_SECS` | `10`                               |
    pub fn from_env() -> Self {
        let timeout_secs: u64 = std::env::var("PROVIDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
            .parse()
            .expect("PROVIDER_TIMEOUT_SECS must be a valid u64");
        let timeout = Duration::from_secs(timeout_secs);

        let endpoint = |url_var: &str, key_var: &str, default_url: &str| {
            ProviderEndpoint::new(
                std::env::var(url_var).unwrap_or_else(|_| default_url.into()),
                std::env::var(key_var).unwrap_or_default(),
            )
            .with_timeout(timeout)
        };

        Self {
            crypto: endpoint("CRYPTO_API_URL", "CRYPTO_API_KEY", DEFAULT_CRYPTO_URL),
            weather: endpoint("WEATHER_API_URL", "WEATHER_API_KEY", DEFAULT_WEATHER_URL),
            football: endpoint("FOOTBALL_API_URL", "FOOTBALL_API_KEY", DEFAULT_FOOTBALL_URL),
        }
    }
}
