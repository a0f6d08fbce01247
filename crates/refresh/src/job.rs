//! The per-widget refresh task.

use std::sync::Arc;
use std::time::Duration;

use doshboard_core::backoff::BackoffPolicy;
use doshboard_core::fetch::FetchError;
use doshboard_core::types::{NormalizedValue, WidgetId};
use doshboard_core::widget::WidgetConfig;
use doshboard_providers::{fetch_bounded, ProviderAdapter};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::WidgetCache;
use crate::scheduler::JobTable;

/// What the scheduler may change on a live job.
#[derive(Clone)]
pub(crate) struct JobSettings {
    pub(crate) config: Arc<WidgetConfig>,
    pub(crate) interval: Duration,
}

/// State shared between the job task, its fetches and the scheduler.
///
/// `in_flight` and `retired` only change under this lock, which is what
/// lets an unregister decide whether a completing fetch must be discarded.
pub(crate) struct JobState {
    pub(crate) next_fire_at: Instant,
    pub(crate) effective_interval: Duration,
    pub(crate) in_flight: bool,
    pub(crate) suspended: bool,
    pub(crate) retired: bool,
}

impl JobState {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            next_fire_at: Instant::now(),
            effective_interval: interval,
            in_flight: false,
            suspended: false,
            retired: false,
        }
    }
}

enum FetchOutcome {
    Succeeded,
    Failed {
        error: FetchError,
        consecutive_failures: u32,
        /// Config generation the failed fetch ran with.
        generation: u64,
    },
}

#[derive(Clone)]
pub(crate) struct JobContext {
    pub(crate) widget_id: WidgetId,
    pub(crate) adapter: Arc<dyn ProviderAdapter>,
    pub(crate) cache: Arc<WidgetCache>,
    pub(crate) policy: BackoffPolicy,
    pub(crate) state: Arc<parking_lot::Mutex<JobState>>,
    pub(crate) jobs: JobTable,
}

/// Timer loop of one job. Runs until `cancel` fires.
pub(crate) async fn run(
    ctx: JobContext,
    mut settings_rx: watch::Receiver<JobSettings>,
    cancel: CancellationToken,
) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let (mut config, mut base) = {
        let settings = settings_rx.borrow_and_update();
        (Arc::clone(&settings.config), settings.interval)
    };
    // Bumped on every config change; a configuration error only suspends
    // the job if it was caused by the current config.
    let mut generation = 0u64;
    let mut failures = 0u32;
    let mut effective = base;
    let mut suspended = false;
    let mut last_fire: Option<Instant> = None;
    let mut next_fire = Instant::now();

    loop {
        ctx.record_schedule(next_fire, effective, suspended);

        tokio::select! {
            _ = cancel.cancelled() => break,

            changed = settings_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let (new_config, new_base) = {
                    let settings = settings_rx.borrow_and_update();
                    (Arc::clone(&settings.config), settings.interval)
                };
                let interval_changed = new_base != base;
                if !Arc::ptr_eq(&new_config, &config) {
                    generation += 1;
                }
                config = new_config;
                base = new_base;
                effective = ctx.policy.effective_interval(base, failures);

                if suspended {
                    suspended = false;
                    next_fire = Instant::now();
                    tracing::info!(widget_id = ctx.widget_id, "Refresh job resumed after configuration change");
                } else if interval_changed {
                    next_fire = Instant::now() + effective;
                }
            }

            Some(outcome) = done_rx.recv() => {
                let mut retry_now = false;
                match outcome {
                    FetchOutcome::Succeeded => failures = 0,
                    FetchOutcome::Failed { error, consecutive_failures, generation: fetched_with } => {
                        failures = consecutive_failures;
                        if !error.is_retryable() && fetched_with != generation {
                            retry_now = true;
                            tracing::info!(
                                widget_id = ctx.widget_id,
                                error = %error,
                                "Configuration error from a replaced config, retrying with the new one",
                            );
                        } else if !error.is_retryable() {
                            suspended = true;
                            tracing::warn!(
                                widget_id = ctx.widget_id,
                                error = %error,
                                "Refresh job suspended until its configuration changes",
                            );
                        }
                    }
                }

                let widened = ctx.policy.effective_interval(base, failures);
                if widened != effective {
                    effective = widened;
                    if let Some(last) = last_fire {
                        next_fire = last + effective;
                    }
                    tracing::info!(
                        widget_id = ctx.widget_id,
                        consecutive_failures = failures,
                        effective_interval_secs = effective.as_secs(),
                        "Refresh interval adjusted",
                    );
                }
                if retry_now {
                    next_fire = Instant::now();
                }
            }

            _ = tokio::time::sleep_until(next_fire), if !suspended => {
                let now = Instant::now();
                last_fire = Some(now);
                next_fire = now + effective;
                ctx.fire(&config, generation, &done_tx);
            }
        }
    }

    tracing::debug!(widget_id = ctx.widget_id, "Refresh job task stopped");
}

impl JobContext {
    fn record_schedule(&self, next_fire_at: Instant, effective_interval: Duration, suspended: bool) {
        let mut state = self.state.lock();
        state.next_fire_at = next_fire_at;
        state.effective_interval = effective_interval;
        state.suspended = suspended;
    }

    /// Dispatch a fetch unless one is already running.
    fn fire(
        &self,
        config: &Arc<WidgetConfig>,
        generation: u64,
        done: &mpsc::UnboundedSender<FetchOutcome>,
    ) {
        {
            let mut state = self.state.lock();
            if state.retired {
                return;
            }
            if state.in_flight {
                tracing::debug!(
                    widget_id = self.widget_id,
                    "Skipped refresh cycle, previous fetch still in flight",
                );
                return;
            }
            state.in_flight = true;
        }

        let ctx = self.clone();
        let config = Arc::clone(config);
        let done = done.clone();
        tokio::spawn(async move {
            let result = fetch_bounded(ctx.adapter.as_ref(), &config).await;
            ctx.complete(result, generation, &done).await;
        });
    }

    /// Apply a fetch result to the cache, or drop it if the job was
    /// unregistered meanwhile.
    async fn complete(
        &self,
        result: Result<NormalizedValue, FetchError>,
        generation: u64,
        done: &mpsc::UnboundedSender<FetchOutcome>,
    ) {
        let outcome = {
            let mut state = self.state.lock();
            state.in_flight = false;
            if state.retired {
                None
            } else {
                Some(match result {
                    Ok(value) => {
                        self.cache.update(self.widget_id, value);
                        FetchOutcome::Succeeded
                    }
                    Err(error) => {
                        let consecutive_failures = self.cache.mark_failed(self.widget_id, &error);
                        tracing::warn!(
                            widget_id = self.widget_id,
                            error_kind = error.kind(),
                            error = %error,
                            consecutive_failures,
                            "Widget refresh failed",
                        );
                        FetchOutcome::Failed {
                            error,
                            consecutive_failures,
                            generation,
                        }
                    }
                })
            }
        };

        match outcome {
            Some(outcome) => {
                // The job task may already be gone after a shutdown.
                let _ = done.send(outcome);
            }
            None => {
                tracing::debug!(widget_id = self.widget_id, "Discarded fetch result of unregistered widget");
                let mut jobs = self.jobs.lock().await;
                let same_job = jobs
                    .get(&self.widget_id)
                    .is_some_and(|handle| Arc::ptr_eq(&handle.state, &self.state));
                if same_job {
                    jobs.remove(&self.widget_id);
                }
            }
        }
    }
}
