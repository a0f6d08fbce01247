//! JSON frames exchanged over `/api/v1/ws`.
//!
//! Client to server:
//!
//! ```text
//! {"type":"subscribe","widget_id":7}
//! {"type":"unsubscribe","widget_id":7}
//! ```
//!
//! Server to client: `update`, `stale`, `subscribed`, `unsubscribed`, `error`.

use axum::extract::ws::Message;
use doshboard_core::types::{NormalizedValue, Timestamp, WidgetId};
use doshboard_refresh::CacheSnapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { widget_id: WidgetId },
    Unsubscribe { widget_id: WidgetId },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current value of a widget.
    Update {
        widget_id: WidgetId,
        value: NormalizedValue,
        fetched_at: Timestamp,
        is_stale: bool,
        stale_since: Option<Timestamp>,
    },
    /// The value just sent could not be refreshed.
    Stale {
        widget_id: WidgetId,
        stale_since: Timestamp,
        consecutive_failures: u32,
    },
    Subscribed {
        widget_id: WidgetId,
    },
    Unsubscribed {
        widget_id: WidgetId,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        widget_id: Option<WidgetId>,
        code: &'static str,
        message: String,
    },
}

impl ServerMessage {
    pub fn update(snapshot: &CacheSnapshot) -> Self {
        ServerMessage::Update {
            widget_id: snapshot.widget_id,
            value: snapshot.value.clone(),
            fetched_at: snapshot.fetched_at,
            is_stale: snapshot.is_stale(),
            stale_since: snapshot.stale_since,
        }
    }

    /// A `stale` notice, if the snapshot is stale.
    pub fn stale(snapshot: &CacheSnapshot) -> Option<Self> {
        snapshot.stale_since.map(|stale_since| ServerMessage::Stale {
            widget_id: snapshot.widget_id,
            stale_since,
            consecutive_failures: snapshot.consecutive_failures,
        })
    }

    pub fn error(widget_id: Option<WidgetId>, code: &'static str, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            widget_id,
            code,
            message: message.into(),
        }
    }

    /// Encode as a text frame.
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(text) => Some(Message::Text(text.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode server message");
                None
            }
        }
    }
}
