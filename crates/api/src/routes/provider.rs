//! Route definitions for provider read-through lookups.

use axum::routing::get;
use axum::Router;

use crate::handlers::football;
use crate::state::AppState;

/// Provider routes mounted at `/providers`.
///
/// ```text
/// GET /football/competitions  -> list_competitions
/// GET /football/teams/{id}    -> get_team
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/football/competitions", get(football::list_competitions))
        .route("/football/teams/{id}", get(football::get_team))
}
