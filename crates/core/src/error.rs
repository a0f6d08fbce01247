use crate::types::DbId;

/// Domain errors surfaced to callers of the configuration and query APIs.
///
/// Provider failures never appear here; they are handled inside the refresh
/// cycle and only become visible as cache staleness.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// Missing or invalid widget configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing widget.
    pub fn widget_not_found(id: DbId) -> Self {
        Self::NotFound {
            entity: "Widget",
            id,
        }
    }
}
