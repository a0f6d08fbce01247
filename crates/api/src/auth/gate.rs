//! Identity resolution for incoming requests and connections.

use async_trait::async_trait;
use doshboard_core::error::CoreError;
use doshboard_core::widget::Identity;

use crate::auth::jwt::{validate_token, JwtConfig};

/// Turns a bearer token into an [`Identity`].
///
/// Called once per HTTP request and once per WebSocket connection; the
/// identity then stays fixed for the lifetime of the connection.
#[async_trait]
pub trait AuthGate: Send + Sync {
    /// Fails with [`CoreError::Unauthorized`] for any invalid token.
    async fn validate(&self, token: &str) -> Result<Identity, CoreError>;
}

/// [`AuthGate`] backed by HS256 JWT validation.
#[derive(Debug, Clone)]
pub struct JwtAuthGate {
    config: JwtConfig,
}

impl JwtAuthGate {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AuthGate for JwtAuthGate {
    async fn validate(&self, token: &str) -> Result<Identity, CoreError> {
        let claims = validate_token(token, &self.config).map_err(|e| {
            tracing::debug!(error = %e, "Rejected access token");
            CoreError::Unauthorized("Invalid or expired token".into())
        })?;

        Ok(Identity {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}
