//! WebSocket push of widget values.
//!
//! Provides the subscription hub, the wire protocol, heartbeat pings and
//! the HTTP upgrade handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod hub;
pub mod protocol;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use hub::{ConnectionId, HubError, SubscriptionHub};
pub use protocol::{ClientMessage, ServerMessage};
