//! The seam between the cache and whatever fans values out to clients.

use crate::cache::CacheSnapshot;

/// Receives every successful cache update, in the order the cache applied
/// them for a given widget.
///
/// Called synchronously on the refresh path, so implementations must not
/// block: hand the snapshot to bounded queues and return.
pub trait UpdateSink: Send + Sync {
    fn publish(&self, snapshot: &CacheSnapshot);
}

/// Discards every update. Used when nothing is listening.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl UpdateSink for NullSink {
    fn publish(&self, _snapshot: &CacheSnapshot) {}
}
