//! The widget refresh engine.
//!
//! - [`RefreshScheduler`] -- one recurring timer per widget, non-overlapping
//!   fetches, failure backoff.
//! - [`WidgetCache`] -- last known good value per widget with staleness.
//! - [`UpdateSink`] -- where fresh cache values are pushed (the subscription
//!   hub in production).

pub mod cache;
mod job;
pub mod scheduler;
pub mod sink;

pub use cache::{CacheError, CacheSnapshot, WidgetCache};
pub use scheduler::{JobStatus, RefreshScheduler, ScheduleError};
pub use sink::{NullSink, UpdateSink};
