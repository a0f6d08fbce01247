use std::sync::Arc;
use std::time::Duration;

use crate::ws::hub::SubscriptionHub;

/// Spawn a background task that sends periodic Ping frames to all connected
/// WebSocket clients.
///
/// The task runs until aborted through the returned `JoinHandle`, which
/// `main` does during shutdown.
pub fn start_heartbeat(hub: Arc<SubscriptionHub>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let count = hub.connection_count();
            tracing::debug!(count, "WebSocket heartbeat ping");
            hub.ping_all();
        }
    })
}
