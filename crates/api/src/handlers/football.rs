//! Read-through football lookups backing the widget settings form.
//!
//! These hit the provider on every call; nothing is cached or scheduled.

use axum::extract::{Path, State};
use axum::Json;
use doshboard_core::types::NormalizedValue;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/providers/football/competitions
pub async fn list_competitions(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<NormalizedValue>>> {
    let competitions = state.football.competitions().await?;
    Ok(Json(DataResponse { data: competitions }))
}

/// GET /api/v1/providers/football/teams/{id}
pub async fn get_team(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<DataResponse<NormalizedValue>>> {
    let team = state.football.team(id).await?;
    Ok(Json(DataResponse { data: team }))
}
