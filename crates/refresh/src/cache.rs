//! Last known good value per widget.
//!
//! Entries are written only by the refresh path of their own widget; every
//! reader gets an owned [`CacheSnapshot`].

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use doshboard_core::fetch::FetchError;
use doshboard_core::types::{NormalizedValue, Timestamp, WidgetId};
use serde::Serialize;

use crate::sink::UpdateSink;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// No fetch for this widget has ever succeeded.
    #[error("No value cached for widget {0}")]
    NotFound(WidgetId),
}

/// Immutable view of a widget's cached value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheSnapshot {
    pub widget_id: WidgetId,
    pub value: NormalizedValue,
    pub fetched_at: Timestamp,
    /// When the value stopped being current: the `fetched_at` of the value
    /// that the first failed refresh could not replace.
    pub stale_since: Option<Timestamp>,
    pub consecutive_failures: u32,
}

impl CacheSnapshot {
    pub fn is_stale(&self) -> bool {
        self.stale_since.is_some()
    }
}

/// Per-widget bookkeeping. `latest` stays `None` until the first success;
/// failures before then are still counted.
#[derive(Debug, Default)]
struct CacheEntry {
    latest: Option<(NormalizedValue, Timestamp)>,
    stale_since: Option<Timestamp>,
    consecutive_failures: u32,
}

impl CacheEntry {
    fn snapshot(&self, widget_id: WidgetId) -> Option<CacheSnapshot> {
        self.latest.as_ref().map(|(value, fetched_at)| CacheSnapshot {
            widget_id,
            value: value.clone(),
            fetched_at: *fetched_at,
            stale_since: self.stale_since,
            consecutive_failures: self.consecutive_failures,
        })
    }
}

pub struct WidgetCache {
    entries: DashMap<WidgetId, CacheEntry>,
    sink: Arc<dyn UpdateSink>,
}

impl WidgetCache {
    pub fn new(sink: Arc<dyn UpdateSink>) -> Self {
        Self {
            entries: DashMap::new(),
            sink,
        }
    }

    /// Record a successful fetch and push the new value to the sink.
    ///
    /// The entry lock is released before publishing.
    pub fn update(&self, widget_id: WidgetId, value: NormalizedValue) -> CacheSnapshot {
        let snapshot = CacheSnapshot {
            widget_id,
            value,
            fetched_at: Utc::now(),
            stale_since: None,
            consecutive_failures: 0,
        };

        {
            let mut entry = self.entries.entry(widget_id).or_default();
            entry.latest = Some((snapshot.value.clone(), snapshot.fetched_at));
            entry.stale_since = None;
            entry.consecutive_failures = 0;
        }

        self.sink.publish(&snapshot);
        snapshot
    }

    /// Record a failed fetch. Returns the new consecutive failure count.
    ///
    /// The first failure after a success marks the value stale as of its
    /// `fetched_at`; later failures leave `stale_since` alone. Nothing is
    /// published.
    pub fn mark_failed(&self, widget_id: WidgetId, error: &FetchError) -> u32 {
        let mut entry = self.entries.entry(widget_id).or_default();
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        if entry.stale_since.is_none() {
            entry.stale_since = entry.latest.as_ref().map(|(_, fetched_at)| *fetched_at);
        }

        tracing::debug!(
            widget_id,
            error_kind = error.kind(),
            consecutive_failures = entry.consecutive_failures,
            "Cache entry marked failed"
        );
        entry.consecutive_failures
    }

    pub fn get(&self, widget_id: WidgetId) -> Result<CacheSnapshot, CacheError> {
        self.entries
            .get(&widget_id)
            .and_then(|entry| entry.snapshot(widget_id))
            .ok_or(CacheError::NotFound(widget_id))
    }

    /// Drop everything known about a widget.
    pub fn remove(&self, widget_id: WidgetId) {
        self.entries.remove(&widget_id);
    }

    /// Number of widgets holding a value.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.latest.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<CacheSnapshot>>);

    impl UpdateSink for Recorder {
        fn publish(&self, snapshot: &CacheSnapshot) {
            self.0.lock().push(snapshot.clone());
        }
    }

    fn cache() -> (WidgetCache, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (WidgetCache::new(recorder.clone()), recorder)
    }

    #[test]
    fn get_before_any_success_is_not_found() {
        let (cache, _) = cache();
        assert_matches!(cache.get(1), Err(CacheError::NotFound(1)));

        cache.mark_failed(1, &FetchError::Timeout);
        assert_matches!(cache.get(1), Err(CacheError::NotFound(1)));
        assert!(cache.is_empty());
    }

    #[test]
    fn update_stores_and_publishes() {
        let (cache, recorder) = cache();

        let snapshot = cache.update(1, serde_json::json!({"price": 1.0}));

        assert_eq!(cache.get(1).unwrap(), snapshot);
        assert!(!snapshot.is_stale());
        assert_eq!(recorder.0.lock().as_slice(), &[snapshot]);
    }

    #[test]
    fn first_failure_marks_stale_at_fetched_at_and_does_not_publish() {
        let (cache, recorder) = cache();
        let fresh = cache.update(1, serde_json::json!(1));

        assert_eq!(cache.mark_failed(1, &FetchError::RateLimited), 1);
        assert_eq!(cache.mark_failed(1, &FetchError::Timeout), 2);

        let stale = cache.get(1).unwrap();
        assert!(stale.is_stale());
        assert_eq!(stale.stale_since, Some(fresh.fetched_at));
        assert_eq!(stale.value, serde_json::json!(1));
        assert_eq!(stale.consecutive_failures, 2);
        assert_eq!(recorder.0.lock().len(), 1, "failures must not publish");
    }

    #[test]
    fn success_clears_staleness_and_failures() {
        let (cache, _) = cache();
        cache.update(1, serde_json::json!(1));
        cache.mark_failed(1, &FetchError::Unreachable("down".into()));

        let fresh = cache.update(1, serde_json::json!(2));

        assert!(!fresh.is_stale());
        assert_eq!(fresh.consecutive_failures, 0);
        assert_eq!(fresh.value, serde_json::json!(2));
    }

    #[test]
    fn failures_before_first_success_leave_staleness_unset() {
        let (cache, _) = cache();
        cache.mark_failed(1, &FetchError::Timeout);

        let snapshot = cache.update(1, serde_json::json!("ok"));
        assert!(!snapshot.is_stale());
    }

    #[test]
    fn remove_forgets_the_widget() {
        let (cache, _) = cache();
        cache.update(1, serde_json::json!(1));
        cache.update(2, serde_json::json!(2));

        cache.remove(1);

        assert_matches!(cache.get(1), Err(CacheError::NotFound(1)));
        assert_eq!(cache.len(), 1);
    }
}
