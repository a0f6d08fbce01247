use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doshboard_api::auth::JwtAuthGate;
use doshboard_api::config::ServerConfig;
use doshboard_api::router::build_app_router;
use doshboard_api::state::AppState;
use doshboard_api::ws;
use doshboard_db::{ConfigStore, InMemoryConfigStore, PgConfigStore};
use doshboard_providers::ProviderRegistry;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "doshboard_api=debug,doshboard_refresh=debug,doshboard_providers=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Configuration store ---
    let store: Arc<dyn ConfigStore> = match &config.database_url {
        Some(database_url) => {
            let pool = doshboard_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            doshboard_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            doshboard_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgConfigStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, widget configuration will not survive restarts");
            Arc::new(InMemoryConfigStore::new())
        }
    };

    // --- Refresh pipeline ---
    let registry = ProviderRegistry::from_settings(&config.providers);
    let auth = Arc::new(JwtAuthGate::new(config.jwt.clone()));
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let heartbeat_interval = Duration::from_secs(config.heartbeat_interval_secs);
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );

    let state = AppState::new(config, store, registry, auth);

    // Subscribe before the initial sync so no change is missed.
    let changes = state.store.subscribe_changes();
    let watcher = state.config_watcher();
    let scheduled = watcher
        .sync_all()
        .await
        .expect("Failed to load widget configurations");
    tracing::info!(widgets = scheduled, "Refresh scheduler started");

    let watcher_cancel = CancellationToken::new();
    let watcher_handle = tokio::spawn(watcher.run(changes, watcher_cancel.clone()));

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&state.hub), heartbeat_interval);

    // --- Start server ---
    let scheduler = Arc::clone(&state.scheduler);
    let hub = Arc::clone(&state.hub);
    let app = build_app_router(state);

    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Upgraded WebSocket connections would hold the graceful shutdown open,
    // so they are closed as soon as the signal arrives.
    let shutdown_hub = Arc::clone(&hub);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let ws_count = shutdown_hub.connection_count();
            tracing::info!(ws_count, "Closing WebSocket connections");
            shutdown_hub.shutdown_all();
        })
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    watcher_cancel.cancel();
    let _ = tokio::time::timeout(shutdown_timeout, watcher_handle).await;
    tracing::info!("Config watcher stopped");

    scheduler.shutdown().await;

    // Connections opened during the drain.
    hub.shutdown_all();

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
