//! Route definitions for widget configuration and values.

use axum::routing::get;
use axum::Router;

use crate::handlers::widget;
use crate::state::AppState;

/// Widget routes mounted at `/widgets`.
///
/// ```text
/// GET    /            -> list_widgets
/// POST   /            -> create_widget
/// GET    /{id}        -> get_widget
/// PATCH  /{id}        -> update_widget
/// DELETE /{id}        -> delete_widget
/// GET    /{id}/value  -> get_widget_value
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(widget::list_widgets).post(widget::create_widget))
        .route(
            "/{id}",
            get(widget::get_widget)
                .patch(widget::update_widget)
                .delete(widget::delete_widget),
        )
        .route("/{id}/value", get(widget::get_widget_value))
}
