/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Widgets are keyed by their database id.
pub type WidgetId = DbId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Provider-normalized payload. Opaque to the refresh pipeline.
pub type NormalizedValue = serde_json::Value;
