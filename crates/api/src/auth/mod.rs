//! Authentication primitives.
//!
//! - [`jwt`] -- HS256 access-token validation.
//! - [`gate`] -- the [`AuthGate`](gate::AuthGate) boundary used once per
//!   HTTP request or WebSocket connection.

pub mod gate;
pub mod jwt;

pub use gate::{AuthGate, JwtAuthGate};
