//! Bearer-token authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use doshboard_core::error::CoreError;
use doshboard_core::types::DbId;
use doshboard_core::widget::Identity;

use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from the `Authorization: Bearer` header.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    /// The user's role name (e.g. `"admin"`, `"user"`).
    pub role: String,
}

impl AuthUser {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            role: self.role.clone(),
        }
    }
}

/// The token from an `Authorization: Bearer <token>` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, CoreError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(Some)
        .ok_or_else(|| {
            CoreError::Unauthorized("Invalid Authorization format. Expected: Bearer <token>".into())
        })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?.ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Authorization header".into(),
            ))
        })?;

        let identity = state.auth.validate(token).await?;

        Ok(AuthUser {
            user_id: identity.user_id,
            role: identity.role,
        })
    }
}
