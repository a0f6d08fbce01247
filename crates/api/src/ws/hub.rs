//! Which connection wants which widget, and fan-out of fresh values.
//!
//! Both relation tables are sharded maps so traffic for one widget never
//! waits on another. Lock order is always `subscribers` before
//! `connections`; neither is held across an `.await`.
//!
//! Deleted widget ids are remembered so a subscription whose store lookup
//! raced the deletion is refused instead of outliving it.
//!
//! Outbound queues are bounded. A connection whose queue is full when a
//! frame is pushed is disconnected; nothing else waits on it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use axum::body::Bytes;
use axum::extract::ws::Message;
use dashmap::{DashMap, DashSet};
use doshboard_core::types::{Timestamp, WidgetId};
use doshboard_core::widget::Identity;
use doshboard_db::{ConfigStore, StoreError};
use doshboard_refresh::{CacheSnapshot, UpdateSink, WidgetCache};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::ws::protocol::ServerMessage;

pub type ConnectionId = String;

/// Sender half of a connection's outbound queue.
pub type OutboundSender = mpsc::Sender<Message>;

/// Receiver half of a connection's outbound queue, drained by the socket
/// writer task.
pub type OutboundReceiver = mpsc::Receiver<Message>;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("Widget {0} not found")]
    WidgetNotFound(WidgetId),

    #[error("Not allowed to subscribe to widget {0}")]
    Forbidden(WidgetId),

    #[error(transparent)]
    Store(StoreError),
}

impl HubError {
    /// Code carried in the `error` frame sent to the client.
    pub fn code(&self) -> &'static str {
        match self {
            HubError::UnknownConnection(_) => "UNKNOWN_CONNECTION",
            HubError::WidgetNotFound(_) => "NOT_FOUND",
            HubError::Forbidden(_) => "FORBIDDEN",
            HubError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

struct Connection {
    identity: Identity,
    sender: OutboundSender,
    widgets: HashSet<WidgetId>,
    connected_at: Timestamp,
}

enum Delivery {
    Sent,
    Overflow,
    Closed,
}

fn deliver(sender: &OutboundSender, message: Message) -> Delivery {
    match sender.try_send(message) {
        Ok(()) => Delivery::Sent,
        Err(TrySendError::Full(_)) => Delivery::Overflow,
        Err(TrySendError::Closed(_)) => Delivery::Closed,
    }
}

pub struct SubscriptionHub {
    store: Arc<dyn ConfigStore>,
    cache: Arc<WidgetCache>,
    outbound_capacity: usize,
    subscribers: DashMap<WidgetId, HashMap<ConnectionId, OutboundSender>>,
    connections: DashMap<ConnectionId, Connection>,
    /// Widgets passed to [`SubscriptionHub::drop_widget`]. Widget ids are
    /// never reused.
    dropped: DashSet<WidgetId>,
}

/// Forwards cache updates to the hub without keeping it alive.
struct HubSink(Weak<SubscriptionHub>);

impl UpdateSink for HubSink {
    fn publish(&self, snapshot: &CacheSnapshot) {
        if let Some(hub) = self.0.upgrade() {
            hub.broadcast(snapshot);
        }
    }
}

impl SubscriptionHub {
    /// Create the hub together with the cache whose updates it fans out.
    pub fn new(store: Arc<dyn ConfigStore>, outbound_capacity: usize) -> Arc<Self> {
        Arc::new_cyclic(|hub| Self {
            store,
            cache: Arc::new(WidgetCache::new(Arc::new(HubSink(hub.clone())))),
            outbound_capacity,
            subscribers: DashMap::new(),
            connections: DashMap::new(),
            dropped: DashSet::new(),
        })
    }

    pub fn cache(&self) -> &Arc<WidgetCache> {
        &self.cache
    }

    /// Register a connection for an authenticated identity.
    pub fn connect(&self, conn_id: ConnectionId, identity: Identity) -> OutboundReceiver {
        let (sender, receiver) = mpsc::channel(self.outbound_capacity);
        tracing::debug!(conn_id = %conn_id, user_id = identity.user_id, "Connection registered");
        self.connections.insert(
            conn_id,
            Connection {
                identity,
                sender,
                widgets: HashSet::new(),
                connected_at: chrono::Utc::now(),
            },
        );
        receiver
    }

    /// Subscribe a connection to a widget it is allowed to see.
    ///
    /// Queues a `subscribed` ack followed by the current value and, if that
    /// value is stale, a `stale` notice. Frames for one widget are queued
    /// under that widget's lock, so the current value can never overtake a
    /// concurrent broadcast.
    pub async fn subscribe(&self, conn_id: &str, widget_id: WidgetId) -> Result<(), HubError> {
        let identity = self
            .connections
            .get(conn_id)
            .map(|conn| conn.identity.clone())
            .ok_or_else(|| HubError::UnknownConnection(conn_id.to_string()))?;

        let config = match self.store.load(widget_id).await {
            Ok(config) => config,
            Err(StoreError::NotFound(_)) => return Err(HubError::WidgetNotFound(widget_id)),
            Err(e) => return Err(HubError::Store(e)),
        };

        if !config.is_visible_to(&identity) {
            tracing::info!(
                conn_id,
                user_id = identity.user_id,
                widget_id,
                "Subscription refused",
            );
            return Err(HubError::Forbidden(widget_id));
        }

        let outcome = {
            let mut subscribers = self.subscribers.entry(widget_id).or_default();
            if self.dropped.contains(&widget_id) {
                drop(subscribers);
                self.subscribers.remove_if(&widget_id, |_, subs| subs.is_empty());
                tracing::debug!(conn_id, widget_id, "Widget deleted during subscription");
                return Err(HubError::WidgetNotFound(widget_id));
            }
            match self.connections.get_mut(conn_id) {
                None => None,
                Some(mut conn) => {
                    conn.widgets.insert(widget_id);
                    let sender = conn.sender.clone();
                    drop(conn);
                    subscribers.insert(conn_id.to_string(), sender.clone());

                    let mut frames = vec![ServerMessage::Subscribed { widget_id }];
                    if let Ok(snapshot) = self.cache.get(widget_id) {
                        frames.push(ServerMessage::update(&snapshot));
                        frames.extend(ServerMessage::stale(&snapshot));
                    }
                    let overflowed = frames
                        .iter()
                        .filter_map(ServerMessage::to_message)
                        .any(|message| !matches!(deliver(&sender, message), Delivery::Sent));
                    Some(overflowed)
                }
            }
        };

        match outcome {
            None => {
                // Disconnected while the store lookup was pending.
                self.subscribers.remove_if(&widget_id, |_, subs| subs.is_empty());
                Err(HubError::UnknownConnection(conn_id.to_string()))
            }
            Some(true) => {
                tracing::warn!(conn_id, widget_id, "Outbound queue full, disconnecting client");
                self.disconnect(conn_id);
                Ok(())
            }
            Some(false) => {
                tracing::debug!(conn_id, widget_id, "Subscribed");
                Ok(())
            }
        }
    }

    /// Remove one relation. Returns whether it existed.
    pub fn unsubscribe(&self, conn_id: &str, widget_id: WidgetId) -> Result<bool, HubError> {
        let removed = match self.subscribers.get_mut(&widget_id) {
            Some(mut subs) => subs.remove(conn_id).is_some(),
            None => false,
        };
        self.subscribers.remove_if(&widget_id, |_, subs| subs.is_empty());

        let sender = {
            let mut conn = self
                .connections
                .get_mut(conn_id)
                .ok_or_else(|| HubError::UnknownConnection(conn_id.to_string()))?;
            conn.widgets.remove(&widget_id);
            conn.sender.clone()
        };

        if let Some(message) = (ServerMessage::Unsubscribed { widget_id }).to_message() {
            if matches!(deliver(&sender, message), Delivery::Overflow) {
                tracing::warn!(conn_id, widget_id, "Outbound queue full, disconnecting client");
                self.disconnect(conn_id);
            }
        }

        tracing::debug!(conn_id, widget_id, removed, "Unsubscribed");
        Ok(removed)
    }

    /// Remove a connection and every relation it holds.
    pub fn disconnect(&self, conn_id: &str) {
        let Some((_, conn)) = self.connections.remove(conn_id) else {
            return;
        };

        for widget_id in &conn.widgets {
            if let Some(mut subs) = self.subscribers.get_mut(widget_id) {
                subs.remove(conn_id);
            }
            self.subscribers.remove_if(widget_id, |_, subs| subs.is_empty());
        }

        let connected_secs = (chrono::Utc::now() - conn.connected_at).num_seconds();
        tracing::info!(
            conn_id,
            user_id = conn.identity.user_id,
            subscriptions = conn.widgets.len(),
            connected_secs,
            "Connection removed from hub",
        );
    }

    /// Push a fresh value to every connection subscribed right now.
    pub fn broadcast(&self, snapshot: &CacheSnapshot) {
        let widget_id = snapshot.widget_id;
        let Some(message) = ServerMessage::update(snapshot).to_message() else {
            return;
        };

        let mut dropped = Vec::new();
        let delivered = {
            let Some(subs) = self.subscribers.get(&widget_id) else {
                return;
            };
            let mut delivered = 0usize;
            for (conn_id, sender) in subs.iter() {
                match deliver(sender, message.clone()) {
                    Delivery::Sent => delivered += 1,
                    Delivery::Overflow => {
                        tracing::warn!(
                            conn_id = %conn_id,
                            widget_id,
                            "Outbound queue full, disconnecting client",
                        );
                        dropped.push(conn_id.clone());
                    }
                    Delivery::Closed => dropped.push(conn_id.clone()),
                }
            }
            delivered
        };

        for conn_id in &dropped {
            self.disconnect(conn_id);
        }
        tracing::trace!(widget_id, delivered, "Broadcast widget update");
    }

    /// Queue a single frame for one connection. Returns `false` if the
    /// connection is gone or was disconnected for overflowing.
    pub fn send(&self, conn_id: &str, message: &ServerMessage) -> bool {
        let Some(sender) = self.connections.get(conn_id).map(|c| c.sender.clone()) else {
            return false;
        };
        let Some(frame) = message.to_message() else {
            return false;
        };

        match deliver(&sender, frame) {
            Delivery::Sent => true,
            Delivery::Overflow => {
                tracing::warn!(conn_id, "Outbound queue full, disconnecting client");
                self.disconnect(conn_id);
                false
            }
            Delivery::Closed => {
                self.disconnect(conn_id);
                false
            }
        }
    }

    /// Forget every subscription to a deleted widget, telling each
    /// subscriber with an `unsubscribed` frame.
    pub fn drop_widget(&self, widget_id: WidgetId) -> usize {
        // Before the removal, so a subscriber holding the entry either sees
        // the mark or is removed below.
        self.dropped.insert(widget_id);
        let Some((_, subs)) = self.subscribers.remove(&widget_id) else {
            return 0;
        };

        let notice = (ServerMessage::Unsubscribed { widget_id }).to_message();
        for (conn_id, sender) in &subs {
            if let Some(mut conn) = self.connections.get_mut(conn_id) {
                conn.widgets.remove(&widget_id);
            }
            if let Some(message) = &notice {
                let _ = sender.try_send(message.clone());
            }
        }

        tracing::info!(widget_id, subscribers = subs.len(), "Dropped subscriptions of deleted widget");
        subs.len()
    }

    /// Send a Ping frame to every connection. Full queues are skipped.
    pub fn ping_all(&self) {
        for conn in self.connections.iter() {
            let _ = conn.sender.try_send(Message::Ping(Bytes::new()));
        }
    }

    /// Send a Close frame to every connection, then clear both tables.
    pub fn shutdown_all(&self) {
        let count = self.connections.len();
        for conn in self.connections.iter() {
            let _ = conn.sender.try_send(Message::Close(None));
        }
        self.connections.clear();
        self.subscribers.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of connections subscribed to `widget_id`.
    pub fn subscriber_count(&self, widget_id: WidgetId) -> usize {
        self.subscribers
            .get(&widget_id)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}
