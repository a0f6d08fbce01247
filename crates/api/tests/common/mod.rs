#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use doshboard_api::auth::jwt::{Claims, JwtConfig};
use doshboard_api::auth::JwtAuthGate;
use doshboard_api::config::ServerConfig;
use doshboard_api::router::build_app_router;
use doshboard_api::state::AppState;
use doshboard_core::backoff::BackoffPolicy;
use doshboard_core::fetch::FetchError;
use doshboard_core::types::{DbId, NormalizedValue};
use doshboard_core::widget::{WidgetConfig, WidgetType};
use doshboard_db::InMemoryConfigStore;
use doshboard_providers::{ProviderAdapter, ProviderEndpoint, ProviderRegistry, ProviderSettings};

pub const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(ws_outbound_capacity: usize) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8080".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: None,
        backoff: BackoffPolicy::default(),
        ws_outbound_capacity,
        heartbeat_interval_secs: 30,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
        },
        providers: ProviderSettings::default(),
    }
}

// ---------------------------------------------------------------------------
// Stub provider
// ---------------------------------------------------------------------------

/// Adapter returning whatever result was last set.
pub struct StubAdapter {
    widget_type: WidgetType,
    next: Mutex<Result<NormalizedValue, FetchError>>,
    calls: AtomicUsize,
    last_config: Mutex<Option<WidgetConfig>>,
}

impl StubAdapter {
    pub fn new(widget_type: WidgetType, value: NormalizedValue) -> Self {
        Self {
            widget_type,
            next: Mutex::new(Ok(value)),
            calls: AtomicUsize::new(0),
            last_config: Mutex::new(None),
        }
    }

    pub fn set(&self, result: Result<NormalizedValue, FetchError>) {
        *self.next.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_config(&self) -> Option<WidgetConfig> {
        self.last_config.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for StubAdapter {
    fn widget_type(&self) -> WidgetType {
        self.widget_type
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn fetch(&self, config: &WidgetConfig) -> Result<NormalizedValue, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock().unwrap() = Some(config.clone());
        self.next.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryConfigStore>,
    pub crypto: Arc<StubAdapter>,
    pub weather: Arc<StubAdapter>,
    watcher_cancel: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.watcher_cancel.cancel();
    }
}

/// Build the full application over an in-memory store and stub providers,
/// with the config watcher running. Must be called inside a Tokio runtime.
pub fn build_test_app() -> TestApp {
    build_test_app_with_capacity(64)
}

pub fn build_test_app_with_capacity(ws_outbound_capacity: usize) -> TestApp {
    build_test_app_with_config(test_config(ws_outbound_capacity))
}

/// Test app whose football lookups go to `football_url`.
pub fn build_test_app_with_football(football_url: &str) -> TestApp {
    let mut config = test_config(64);
    config.providers.football = ProviderEndpoint::new(football_url, "fd-test-key");
    build_test_app_with_config(config)
}

pub fn build_test_app_with_config(config: ServerConfig) -> TestApp {
    let store = Arc::new(InMemoryConfigStore::new());
    let crypto = Arc::new(StubAdapter::new(
        WidgetType::Crypto,
        serde_json::json!({"currency": "BTC", "price": 100.0}),
    ));
    let weather = Arc::new(StubAdapter::new(
        WidgetType::Weather,
        serde_json::json!({"city": "Lisbon", "temperature": 21.5}),
    ));

    let mut registry = ProviderRegistry::new();
    registry.register(crypto.clone());
    registry.register(weather.clone());

    let auth = Arc::new(JwtAuthGate::new(config.jwt.clone()));
    let state = AppState::new(config, store.clone(), registry, auth);

    let watcher_cancel = CancellationToken::new();
    let changes = state.store.subscribe_changes();
    tokio::spawn(state.config_watcher().run(changes, watcher_cancel.clone()));

    TestApp {
        router: build_app_router(state.clone()),
        state,
        store,
        crypto,
        weather,
        watcher_cancel,
    }
}

/// Mint an HS256 access token accepted by the test app.
pub fn token(user_id: DbId, role: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp: now + 3600,
        iat: now,
        jti: uuid::Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("encoding should succeed")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str, token: &str) -> Response {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn get_public(app: &Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None, None).await
}

pub async fn post_json(app: &Router, uri: &str, token: &str, body: Value) -> Response {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn patch_json(app: &Router, uri: &str, token: &str, body: Value) -> Response {
    send(app, Method::PATCH, uri, Some(token), Some(body)).await
}

pub async fn delete(app: &Router, uri: &str, token: &str) -> Response {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create a widget over HTTP and return its `data` payload.
pub async fn create_widget(app: &Router, token: &str, body: Value) -> Value {
    let response = post_json(app, "/api/v1/widgets", token, body).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within five seconds"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
