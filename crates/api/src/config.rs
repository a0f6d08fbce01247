use std::time::Duration;

use doshboard_core::backoff::{BackoffPolicy, DEFAULT_FAILURE_CEILING, DEFAULT_MAX_INTERVAL};
use doshboard_providers::ProviderSettings;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on waiting for background tasks at shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Postgres URL for the configuration store. Unset selects the
    /// in-memory store.
    pub database_url: Option<String>,
    /// Failure backoff applied by the refresh scheduler.
    pub backoff: BackoffPolicy,
    /// Outbound queue size per WebSocket connection (default: `64`).
    pub ws_outbound_capacity: usize,
    /// Seconds between WebSocket pings (default: `30`).
    pub heartbeat_interval_secs: u64,
    /// JWT validation settings.
    pub jwt: JwtConfig,
    /// Provider endpoints and credentials.
    pub providers: ProviderSettings,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                  |
    /// |------------------------------|--------------------------|
    /// | `HOST`                       | `0.0.0.0`                |
    /// | `PORT`                       | `3000`                   |
    /// | `CORS_ORIGINS`               | `http://localhost:8080`  |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                     |
    /// | `DATABASE_URL`               | unset (in-memory store)  |
    /// | `BACKOFF_FAILURE_CEILING`    | `3`                      |
    /// | `BACKOFF_MAX_INTERVAL_SECS`  | `900`                    |
    /// | `WS_OUTBOUND_CAPACITY`       | `64`                     |
    /// | `WS_HEARTBEAT_INTERVAL_SECS` | `30`                     |
    ///
    /// JWT and provider settings are read by [`JwtConfig::from_env`] and
    /// [`ProviderSettings::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8080".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let failure_ceiling: u32 = std::env::var("BACKOFF_FAILURE_CEILING")
            .unwrap_or_else(|_| DEFAULT_FAILURE_CEILING.to_string())
            .parse()
            .expect("BACKOFF_FAILURE_CEILING must be a valid u32");

        let max_interval_secs: u64 = std::env::var("BACKOFF_MAX_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_MAX_INTERVAL.as_secs().to_string())
            .parse()
            .expect("BACKOFF_MAX_INTERVAL_SECS must be a valid u64");

        let ws_outbound_capacity: usize = std::env::var("WS_OUTBOUND_CAPACITY")
            .unwrap_or_else(|_| "64".into())
            .parse()
            .expect("WS_OUTBOUND_CAPACITY must be a valid usize");
        require_positive("WS_OUTBOUND_CAPACITY", ws_outbound_capacity);

        let heartbeat_interval_secs: u64 = std::env::var("WS_HEARTBEAT_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("WS_HEARTBEAT_INTERVAL_SECS must be a valid u64");
        require_positive("WS_HEARTBEAT_INTERVAL_SECS", heartbeat_interval_secs);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url,
            backoff: BackoffPolicy {
                failure_ceiling,
                max_interval: Duration::from_secs(max_interval_secs),
            },
            ws_outbound_capacity,
            heartbeat_interval_secs,
            jwt: JwtConfig::from_env(),
            providers: ProviderSettings::from_env(),
        }
    }
}

/// Fail start-up on a zero queue size or tick period.
fn require_positive<T: Default + PartialOrd>(name: &str, value: T) {
    assert!(value > T::default(), "{name} must be positive");
}
