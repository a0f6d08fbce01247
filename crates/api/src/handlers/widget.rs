//! Handlers for widget configuration and cached values.
//!
//! Configuration writes go to the store only; the config watcher turns the
//! resulting change notifications into scheduler operations, which is why
//! updates and deletes answer `202 Accepted`.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use doshboard_core::error::CoreError;
use doshboard_core::types::{NormalizedValue, Timestamp, WidgetId};
use doshboard_core::widget::{NewWidget, WidgetConfig, WidgetPatch, WidgetType};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /widgets`.
#[derive(Debug, Deserialize)]
pub struct CreateWidgetRequest {
    pub widget_type: WidgetType,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Defaults to the widget type's usual cadence.
    pub refresh_interval_secs: Option<u64>,
}

/// Body of `GET /widgets/{id}/value`.
#[derive(Debug, Serialize)]
pub struct WidgetValueResponse {
    pub widget_id: WidgetId,
    pub value: NormalizedValue,
    pub fetched_at: Timestamp,
    pub is_stale: bool,
    pub stale_since: Option<Timestamp>,
}

/// Load a widget the caller may see.
async fn load_visible(state: &AppState, user: &AuthUser, id: WidgetId) -> AppResult<WidgetConfig> {
    let config = state.store.load(id).await?;
    if !config.is_visible_to(&user.identity()) {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Widget {id} belongs to another user"
        ))));
    }
    Ok(config)
}

/// POST /api/v1/widgets
pub async fn create_widget(
    user: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateWidgetRequest>,
) -> AppResult<impl IntoResponse> {
    let new_widget = NewWidget {
        owner_id: user.user_id,
        widget_type: input.widget_type,
        params: input.params,
        refresh_interval_secs: input
            .refresh_interval_secs
            .unwrap_or_else(|| input.widget_type.default_refresh_interval_secs()),
    };
    new_widget.validate()?;

    let config = state.store.create(new_widget).await?;

    tracing::info!(
        widget_id = config.widget_id,
        owner_id = config.owner_id,
        widget_type = %config.widget_type,
        "Widget created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: config })))
}

/// GET /api/v1/widgets
///
/// Widgets owned by the caller.
pub async fn list_widgets(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let widgets = state.store.list_for_owner(user.user_id).await?;
    Ok(Json(DataResponse { data: widgets }))
}

/// GET /api/v1/widgets/{id}
pub async fn get_widget(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<WidgetId>,
) -> AppResult<impl IntoResponse> {
    let config = load_visible(&state, &user, id).await?;
    Ok(Json(DataResponse { data: config }))
}

/// PATCH /api/v1/widgets/{id}
///
/// Merge provider parameters and/or change the refresh interval. The new
/// schedule takes effect asynchronously.
pub async fn update_widget(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<WidgetId>,
    Json(patch): Json<WidgetPatch>,
) -> AppResult<impl IntoResponse> {
    if patch.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".into()));
    }

    let mut config = load_visible(&state, &user, id).await?;
    patch.apply(&mut config)?;
    state.store.save(&config).await?;

    tracing::info!(
        widget_id = id,
        user_id = user.user_id,
        refresh_interval_secs = config.refresh_interval_secs,
        "Widget configuration updated",
    );

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: config })))
}

/// DELETE /api/v1/widgets/{id}
pub async fn delete_widget(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<WidgetId>,
) -> AppResult<StatusCode> {
    load_visible(&state, &user, id).await?;
    state.store.delete(id).await?;

    tracing::info!(widget_id = id, user_id = user.user_id, "Widget deleted");

    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/widgets/{id}/value
///
/// The last successfully fetched value, possibly stale. 404 until the first
/// fetch succeeds.
pub async fn get_widget_value(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<WidgetId>,
) -> AppResult<impl IntoResponse> {
    load_visible(&state, &user, id).await?;
    let snapshot = state.hub.cache().get(id)?;

    Ok(Json(DataResponse {
        data: WidgetValueResponse {
            widget_id: snapshot.widget_id,
            is_stale: snapshot.is_stale(),
            value: snapshot.value,
            fetched_at: snapshot.fetched_at,
            stale_since: snapshot.stale_since,
        },
    }))
}
