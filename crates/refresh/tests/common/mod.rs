#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use doshboard_core::backoff::BackoffPolicy;
use doshboard_core::fetch::FetchError;
use doshboard_core::types::{NormalizedValue, WidgetId};
use doshboard_core::widget::{WidgetConfig, WidgetType};
use doshboard_providers::{ProviderAdapter, ProviderRegistry};
use doshboard_refresh::{CacheSnapshot, RefreshScheduler, UpdateSink, WidgetCache};
use parking_lot::Mutex;
use tokio::time::Instant;

/// One scripted provider response.
pub struct Step {
    pub delay: Duration,
    pub result: Result<NormalizedValue, FetchError>,
}

pub fn ok(value: NormalizedValue) -> Step {
    Step {
        delay: Duration::ZERO,
        result: Ok(value),
    }
}

pub fn err(error: FetchError) -> Step {
    Step {
        delay: Duration::ZERO,
        result: Err(error),
    }
}

pub fn slow(delay: Duration, step: Step) -> Step {
    Step { delay, ..step }
}

/// Crypto adapter that replays a script, then repeats `fallback` forever.
pub struct ScriptedAdapter {
    script: Mutex<VecDeque<Step>>,
    fallback: fn() -> Step,
    timeout: Duration,
    calls: Mutex<Vec<(Instant, WidgetConfig)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(script: Vec<Step>, fallback: fn() -> Step) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            timeout: Duration::from_secs(30),
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch start times as whole seconds after `start`.
    pub fn call_offsets(&self, start: Instant) -> Vec<u64> {
        self.calls
            .lock()
            .iter()
            .map(|(at, _)| (*at - start).as_secs_f64().round() as u64)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_config(&self) -> Option<WidgetConfig> {
        self.calls.lock().last().map(|(_, config)| config.clone())
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

/// Decrements the active counter even when the fetch future is dropped by
/// a timeout.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn widget_type(&self) -> WidgetType {
        WidgetType::Crypto
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, config: &WidgetConfig) -> Result<NormalizedValue, FetchError> {
        self.calls.lock().push((Instant::now(), config.clone()));
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let step = self.script.lock().pop_front().unwrap_or_else(self.fallback);
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        step.result
    }
}

/// Sink that remembers every published snapshot.
#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<CacheSnapshot>>,
}

impl RecordingSink {
    pub fn published(&self) -> Vec<CacheSnapshot> {
        self.published.lock().clone()
    }
}

impl UpdateSink for RecordingSink {
    fn publish(&self, snapshot: &CacheSnapshot) {
        self.published.lock().push(snapshot.clone());
    }
}

pub struct Harness {
    pub scheduler: RefreshScheduler,
    pub cache: Arc<WidgetCache>,
    pub sink: Arc<RecordingSink>,
    pub adapter: Arc<ScriptedAdapter>,
}

pub fn harness(adapter: ScriptedAdapter, policy: BackoffPolicy) -> Harness {
    let adapter = Arc::new(adapter);
    let sink = Arc::new(RecordingSink::default());
    let cache = Arc::new(WidgetCache::new(sink.clone()));

    let mut registry = ProviderRegistry::new();
    registry.register(adapter.clone());

    Harness {
        scheduler: RefreshScheduler::new(registry, cache.clone(), policy),
        cache,
        sink,
        adapter,
    }
}

pub fn crypto_widget(widget_id: WidgetId, interval_secs: u64) -> WidgetConfig {
    WidgetConfig {
        widget_id,
        owner_id: 1,
        widget_type: WidgetType::Crypto,
        params: BTreeMap::from([("currency".to_string(), "BTC".to_string())]),
        refresh_interval_secs: interval_secs,
    }
}

/// Let the paused clock run until `secs` after `start`.
pub async fn run_until(start: Instant, secs: f64) {
    tokio::time::sleep_until(start + Duration::from_secs_f64(secs)).await;
}
