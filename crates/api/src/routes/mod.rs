pub mod health;
pub mod provider;
pub mod widget;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                        WebSocket (subscribe / unsubscribe)
///
/// /widgets                   list, create
/// /widgets/{id}              get, update (PATCH), delete
/// /widgets/{id}/value        current cached value
///
/// /providers/football/...    read-through competition and team lookups
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/widgets", widget::router())
        .nest("/providers", provider::router())
}
