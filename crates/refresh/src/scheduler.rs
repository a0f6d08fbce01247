//! One recurring refresh job per registered widget.
//!
//! Each job is a long-lived Tokio task owning its timer. Fetches run in
//! their own tasks so a slow provider never delays the timer, but a job
//! never has more than one fetch in flight: a fire that finds the previous
//! fetch still running is skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use doshboard_core::backoff::BackoffPolicy;
use doshboard_core::types::WidgetId;
use doshboard_core::widget::{WidgetConfig, WidgetType};
use doshboard_providers::ProviderRegistry;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::WidgetCache;
use crate::job::{self, JobContext, JobSettings, JobState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Widget {0} is already scheduled")]
    AlreadyRegistered(WidgetId),

    #[error("Widget {0} is not scheduled")]
    NotRegistered(WidgetId),

    #[error("No provider adapter for widget type '{0}'")]
    NoProvider(WidgetType),
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub widget_id: WidgetId,
    /// When the timer fires next. Meaningless while `suspended`.
    pub next_fire_at: Instant,
    pub in_flight: bool,
    /// Configured interval.
    pub base_interval: Duration,
    /// Interval after backoff.
    pub effective_interval: Duration,
    /// The last fetch failed with a configuration error; the job waits for
    /// [`RefreshScheduler::update_config`].
    pub suspended: bool,
    /// Unregistered, waiting for its in-flight fetch to finish.
    pub retiring: bool,
}

/// Handle the scheduler keeps for each job.
pub(crate) struct JobHandle {
    pub(crate) state: Arc<parking_lot::Mutex<JobState>>,
    settings: watch::Sender<JobSettings>,
    cancel: CancellationToken,
}

pub(crate) type JobTable = Arc<Mutex<HashMap<WidgetId, JobHandle>>>;

pub struct RefreshScheduler {
    registry: ProviderRegistry,
    cache: Arc<WidgetCache>,
    policy: BackoffPolicy,
    jobs: JobTable,
    cancel: CancellationToken,
}

impl RefreshScheduler {
    pub fn new(registry: ProviderRegistry, cache: Arc<WidgetCache>, policy: BackoffPolicy) -> Self {
        Self {
            registry,
            cache,
            policy,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cache(&self) -> &Arc<WidgetCache> {
        &self.cache
    }

    /// Start refreshing `config`. The first fetch is dispatched immediately.
    pub async fn register(&self, config: WidgetConfig) -> Result<(), ScheduleError> {
        let widget_id = config.widget_id;
        let adapter = self
            .registry
            .get(config.widget_type)
            .ok_or(ScheduleError::NoProvider(config.widget_type))?;

        let mut jobs = self.jobs.lock().await;
        // A retiring job keeps its slot until its in-flight fetch completes.
        if jobs.contains_key(&widget_id) {
            return Err(ScheduleError::AlreadyRegistered(widget_id));
        }

        let interval = config.refresh_interval();
        let state = Arc::new(parking_lot::Mutex::new(JobState::new(interval)));
        let (settings_tx, settings_rx) = watch::channel(JobSettings {
            config: Arc::new(config),
            interval,
        });
        let cancel = self.cancel.child_token();

        let ctx = JobContext {
            widget_id,
            adapter,
            cache: Arc::clone(&self.cache),
            policy: self.policy,
            state: Arc::clone(&state),
            jobs: Arc::clone(&self.jobs),
        };
        tokio::spawn(job::run(ctx, settings_rx, cancel.clone()));

        jobs.insert(
            widget_id,
            JobHandle {
                state,
                settings: settings_tx,
                cancel,
            },
        );

        tracing::info!(
            widget_id,
            interval_secs = interval.as_secs(),
            "Refresh job registered",
        );
        Ok(())
    }

    /// Change a job's base interval. Returns `false` when it was already
    /// `new_interval`, in which case nothing happens.
    ///
    /// Otherwise the next fire is `now + new_interval` (widened by any
    /// active backoff).
    pub async fn reschedule(
        &self,
        widget_id: WidgetId,
        new_interval: Duration,
    ) -> Result<bool, ScheduleError> {
        let jobs = self.jobs.lock().await;
        let handle = live_job(&jobs, widget_id)?;

        let changed = handle.settings.send_if_modified(|settings| {
            if settings.interval == new_interval {
                return false;
            }
            settings.interval = new_interval;
            true
        });

        if changed {
            tracing::info!(
                widget_id,
                interval_secs = new_interval.as_secs(),
                "Refresh job rescheduled",
            );
        }
        Ok(changed)
    }

    /// Replace the configuration snapshot a job fetches with.
    ///
    /// An interval change behaves like [`reschedule`](Self::reschedule). A job
    /// suspended by a configuration error resumes and fires immediately.
    /// Returns `false` when `config` is identical to the current snapshot.
    pub async fn update_config(&self, config: WidgetConfig) -> Result<bool, ScheduleError> {
        let widget_id = config.widget_id;
        let jobs = self.jobs.lock().await;
        let handle = live_job(&jobs, widget_id)?;

        let changed = handle.settings.send_if_modified(|settings| {
            if *settings.config == config {
                return false;
            }
            settings.interval = config.refresh_interval();
            settings.config = Arc::new(config);
            true
        });

        if changed {
            tracing::info!(widget_id, "Refresh job configuration updated");
        }
        Ok(changed)
    }

    /// Stop refreshing a widget.
    ///
    /// If a fetch is in flight the job stays registered until it completes
    /// and its result is discarded.
    pub async fn unregister(&self, widget_id: WidgetId) -> Result<(), ScheduleError> {
        let mut jobs = self.jobs.lock().await;
        let deferred = {
            let handle = live_job(&jobs, widget_id)?;
            handle.cancel.cancel();
            let mut state = handle.state.lock();
            state.retired = true;
            state.in_flight
        };

        if deferred {
            tracing::info!(widget_id, "Refresh job unregistered, waiting for in-flight fetch");
        } else {
            jobs.remove(&widget_id);
            tracing::info!(widget_id, "Refresh job unregistered");
        }
        Ok(())
    }

    pub async fn job_status(&self, widget_id: WidgetId) -> Option<JobStatus> {
        let jobs = self.jobs.lock().await;
        jobs.get(&widget_id).map(|handle| {
            let base_interval = handle.settings.borrow().interval;
            let state = handle.state.lock();
            JobStatus {
                widget_id,
                next_fire_at: state.next_fire_at,
                in_flight: state.in_flight,
                base_interval,
                effective_interval: state.effective_interval,
                suspended: state.suspended,
                retiring: state.retired,
            }
        })
    }

    /// Number of jobs, including ones waiting on an in-flight fetch.
    pub async fn job_count(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_registered(&self, widget_id: WidgetId) -> bool {
        self.jobs.lock().await.contains_key(&widget_id)
    }

    /// Ids of all live (not retiring) jobs.
    pub async fn widget_ids(&self) -> Vec<WidgetId> {
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|(_, handle)| !handle.state.lock().retired)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Cancel every job. Results of fetches still in flight are discarded.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut jobs = self.jobs.lock().await;
        for handle in jobs.values() {
            handle.state.lock().retired = true;
        }
        let count = jobs.len();
        jobs.clear();
        tracing::info!(jobs = count, "Refresh scheduler shut down");
    }
}

/// A job that has not been unregistered.
fn live_job(
    jobs: &HashMap<WidgetId, JobHandle>,
    widget_id: WidgetId,
) -> Result<&JobHandle, ScheduleError> {
    jobs.get(&widget_id)
        .filter(|handle| !handle.state.lock().retired)
        .ok_or(ScheduleError::NotRegistered(widget_id))
}
