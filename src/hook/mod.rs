// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Consumer-facing binding hook
//!
//! Mounting a hook subscribes it to a detection backend and relays every
//! adopted status to a state setter, debounced, with a rolling history and
//! convenience flags. Failed detections are retried with exponential backoff
//! before the error is surfaced. Once unmounted the setter is never called
//! again.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::HookConfig;
use crate::core::{listener, DetectorEvent, EventType, Scheduler, Subscription};
use crate::detection::{DetectionBackend, DeviceStatus, DeviceType};
use crate::telemetry::{Metrics, TelemetryEvent};

const STATUS_DEBOUNCE_TASK: &str = "status-debounce";
const RETRY_TASK: &str = "retry";
const INITIAL_TASK: &str = "initial-detection";

/// Receives every consumer-visible state change
pub type StateSetter = Arc<dyn Fn(&HookSnapshot) + Send + Sync + 'static>;

#[derive(Debug, Clone)]
struct HookState {
    status: DeviceStatus,
    is_loading: bool,
    error: Option<String>,
    retry_count: u32,
    /// Most recent first
    history: VecDeque<DeviceStatus>,
    last_updated: Option<DateTime<Utc>>,
}

/// What the consumer sees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSnapshot {
    pub status: DeviceStatus,
    pub is_loading: bool,
    pub error: Option<String>,
    pub retry_count: u32,
    pub history: Vec<DeviceStatus>,
    pub last_updated: Option<DateTime<Utc>>,
    pub has_headphones: bool,
    pub is_wired: bool,
    pub is_bluetooth: bool,
    pub is_high_confidence: bool,
    pub is_circuit_breaker_open: bool,
    pub metrics: Metrics,
}

struct HookInner {
    backend: Arc<dyn DetectionBackend>,
    config: HookConfig,
    setter: StateSetter,
    state: Mutex<HookState>,
    scheduler: Scheduler,
    subscriptions: Mutex<Vec<Subscription>>,
    mounted: AtomicBool,
    owns_listening: AtomicBool,
    /// Backend events received; a fresh pass always produces one
    events_seen: AtomicU64,
}

pub struct HeadphoneHook {
    inner: Arc<HookInner>,
}

impl HeadphoneHook {
    pub fn mount(backend: Arc<dyn DetectionBackend>, config: HookConfig, setter: StateSetter) -> Self {
        let inner = Arc::new(HookInner {
            backend,
            state: Mutex::new(HookState {
                status: DeviceStatus::empty(),
                is_loading: config.auto_start,
                error: None,
                retry_count: 0,
                history: VecDeque::with_capacity(config.history_limit),
                last_updated: None,
            }),
            config,
            setter,
            scheduler: Scheduler::new(),
            subscriptions: Mutex::new(Vec::new()),
            mounted: AtomicBool::new(true),
            owns_listening: AtomicBool::new(false),
            events_seen: AtomicU64::new(0),
        });

        let weak = Arc::downgrade(&inner);
        let on_status = inner.backend.add_listener(
            EventType::StatusChanged,
            listener(move |event| {
                if let (Some(inner), DetectorEvent::StatusChanged(status)) = (weak.upgrade(), event) {
                    inner.events_seen.fetch_add(1, Ordering::SeqCst);
                    inner.debounce_status(status.clone());
                }
            }),
        );

        let weak = Arc::downgrade(&inner);
        let on_error = inner.backend.add_listener(
            EventType::Error,
            listener(move |event| {
                if let (Some(inner), DetectorEvent::Error(failure)) = (weak.upgrade(), event) {
                    inner.events_seen.fetch_add(1, Ordering::SeqCst);
                    inner.handle_error(&failure.message);
                }
            }),
        );
        inner.subscriptions.lock().extend([on_status, on_error]);

        if inner.config.auto_start {
            let listening = inner.backend.start_listening();
            inner.owns_listening.store(listening, Ordering::SeqCst);

            let weak = Arc::downgrade(&inner);
            inner.scheduler.spawn(INITIAL_TASK, async move {
                if let Some(inner) = weak.upgrade() {
                    let seen = inner.events_seen.load(Ordering::SeqCst);
                    let status = inner.backend.current_status().await;
                    // Served from cache: no statusChanged will follow, record it here
                    let from_cache = !inner.answered_since(seen) && inner.backend.cache_info().is_valid;
                    inner.apply(status, from_cache);
                }
            });
        }

        debug!("Hook mounted on '{}' backend", inner.backend.name());
        Self { inner }
    }

    /// Run a detection now and apply its result; retries and history are left alone
    pub async fn refresh(&self) -> DeviceStatus {
        self.inner.state.lock().is_loading = true;
        self.inner.notify();
        let status = self.inner.backend.current_status().await;
        self.inner.apply(status.clone(), false);
        status
    }

    pub fn snapshot(&self) -> HookSnapshot {
        self.inner.snapshot()
    }

    pub fn status(&self) -> DeviceStatus {
        self.inner.state.lock().status.clone()
    }

    pub fn history(&self) -> Vec<DeviceStatus> {
        self.inner.state.lock().history.iter().cloned().collect()
    }

    pub fn reset_circuit_breaker(&self) {
        self.inner.backend.reset_circuit_breaker();
    }

    pub fn invalidate_cache(&self) {
        self.inner.backend.invalidate_cache();
    }

    pub fn export_telemetry(&self) -> Vec<TelemetryEvent> {
        self.inner.backend.export_telemetry()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    /// Detach from the backend and cancel every pending timer. Idempotent.
    pub fn unmount(&self) {
        if !self.inner.mounted.swap(false, Ordering::SeqCst) {
            return;
        }

        for subscription in self.inner.subscriptions.lock().drain(..) {
            subscription.remove();
        }
        self.inner.scheduler.cancel_all();
        if self.inner.owns_listening.swap(false, Ordering::SeqCst) {
            self.inner.backend.stop_listening();
        }
        info!("Hook unmounted");
    }
}

impl Drop for HeadphoneHook {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl HookInner {
    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    fn answered_since(&self, seen: u64) -> bool {
        self.events_seen.load(Ordering::SeqCst) != seen
    }

    fn debounce_status(self: &Arc<Self>, status: DeviceStatus) {
        if !self.is_mounted() {
            return;
        }
        let weak: Weak<HookInner> = Arc::downgrade(self);
        self.scheduler.schedule_once(
            STATUS_DEBOUNCE_TASK,
            Duration::from_millis(self.config.debounce_ms),
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.apply(status, true);
                }
            },
        );
    }

    fn handle_error(self: &Arc<Self>, message: &str) {
        if !self.is_mounted() {
            return;
        }

        let retry = {
            let mut state = self.state.lock();
            if state.retry_count < self.config.max_retries {
                let delay = Duration::from_secs(2u64.saturating_pow(state.retry_count));
                state.retry_count += 1;
                Some((delay, state.retry_count))
            } else {
                state.error = Some(message.to_string());
                state.is_loading = false;
                None
            }
        };

        match retry {
            Some((delay, attempt)) => {
                debug!("Detection failed, retry {} in {:?}", attempt, delay);
                let weak = Arc::downgrade(self);
                self.scheduler.schedule_once(RETRY_TASK, delay, async move {
                    if let Some(inner) = weak.upgrade() {
                        let seen = inner.events_seen.load(Ordering::SeqCst);
                        let status = inner.backend.current_status().await;
                        // No event means the open breaker skipped the pass
                        if !inner.answered_since(seen) && inner.backend.is_circuit_breaker_open() {
                            inner.handle_error("detection skipped while the circuit breaker is open");
                        }
                        inner.apply(status, false);
                    }
                });
            }
            None => {
                warn!("Detection failed after {} retries: {}", self.config.max_retries, message);
                self.notify();
            }
        }
    }

    /// Update consumer state; `adopted` statuses also enter the history and clear errors
    fn apply(&self, status: DeviceStatus, adopted: bool) {
        if !self.is_mounted() {
            return;
        }
        {
            let mut state = self.state.lock();
            state.status = status.clone();
            state.is_loading = false;
            state.last_updated = Some(Utc::now());
            if adopted {
                state.history.push_front(status);
                state.history.truncate(self.config.history_limit);
                state.retry_count = 0;
                state.error = None;
            }
        }
        self.notify();
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        if self.is_mounted() {
            (self.setter)(&snapshot);
        }
    }

    fn snapshot(&self) -> HookSnapshot {
        let state = self.state.lock().clone();
        let status = &state.status;
        HookSnapshot {
            has_headphones: status.is_connected,
            is_wired: status.is_connected && status.device_type == DeviceType::Wired,
            is_bluetooth: status.is_connected && status.device_type == DeviceType::Bluetooth,
            is_high_confidence: status.confidence >= self.config.high_confidence_threshold,
            is_circuit_breaker_open: self.backend.is_circuit_breaker_open(),
            metrics: self.backend.metrics(),
            history: state.history.iter().cloned().collect(),
            status: state.status.clone(),
            is_loading: state.is_loading,
            error: state.error.clone(),
            retry_count: state.retry_count,
            last_updated: state.last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use crate::config::Config;
    use crate::detection::HeadphoneDetector;
    use crate::platform::{PlatformKind, SimulatedPlatform};

    fn recorder() -> (StateSetter, Arc<Mutex<Vec<HookSnapshot>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let setter: StateSetter = Arc::new(move |snapshot: &HookSnapshot| {
            sink.lock().push(snapshot.clone());
        });
        (setter, seen)
    }

    /// Speakers and a silent mono output: nothing clears 0.5, every pass fails
    fn silent_speakers() -> Arc<SimulatedPlatform> {
        let sim = SimulatedPlatform::new();
        sim.set_audio_output(
            crate::platform::AudioOutputInfo {
                sample_rate: 22050.0,
                max_channel_count: 1,
                output_latency: None,
            },
            false,
        );
        sim
    }

    fn backend_for(sim: &Arc<SimulatedPlatform>) -> Arc<dyn DetectionBackend> {
        Arc::new(HeadphoneDetector::new(sim.platform(PlatformKind::Web), &Config::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_start_applies_first_status() {
        let sim = SimulatedPlatform::with_wired_headphones();
        let (setter, seen) = recorder();
        let hook = HeadphoneHook::mount(backend_for(&sim), HookConfig::default(), setter);
        assert!(hook.snapshot().is_loading);

        tokio::time::sleep(Duration::from_secs(1)).await;

        let snapshot = hook.snapshot();
        assert!(snapshot.has_headphones);
        assert!(snapshot.is_wired);
        assert!(!snapshot.is_loading);
        assert!(snapshot.is_high_confidence);
        // debounced statusChanged lands in history
        assert_eq!(snapshot.history.len(), 1);
        assert!(!seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_updates_after_unmount() {
        let sim = SimulatedPlatform::with_wired_headphones();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let setter: StateSetter = Arc::new(move |_: &HookSnapshot| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let hook = HeadphoneHook::mount(backend_for(&sim), HookConfig::default(), setter);
        // let the initial detection start and park inside enumeration
        tokio::task::yield_now().await;
        hook.unmount();
        hook.unmount();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!hook.is_mounted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_changes() {
        let sim = SimulatedPlatform::with_wired_headphones();
        let backend = backend_for(&sim);
        let (setter, seen) = recorder();
        let config = HookConfig { auto_start: false, ..HookConfig::default() };
        let hook = HeadphoneHook::mount(backend.clone(), config, setter);

        for _ in 0..3 {
            backend.invalidate_cache();
            backend.current_status().await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(hook.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_surfaces_error() {
        let sim = silent_speakers();
        let backend = backend_for(&sim);
        let (setter, seen) = recorder();
        let config = HookConfig { auto_start: false, max_retries: 2, ..HookConfig::default() };
        let hook = HeadphoneHook::mount(backend.clone(), config, setter);

        backend.current_status().await;
        assert_eq!(hook.snapshot().retry_count, 1);

        // retry after 1s, then 2s
        tokio::time::sleep(Duration::from_millis(3500)).await;
        let snapshot = hook.snapshot();
        assert_eq!(snapshot.retry_count, 2);
        assert!(snapshot.error.is_some());
        assert!(seen.lock().iter().any(|s| s.error.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_skipped_by_open_breaker_still_surface_error() {
        let sim = silent_speakers();
        let backend = backend_for(&sim);
        for _ in 0..4 {
            backend.current_status().await;
        }
        assert!(!backend.is_circuit_breaker_open());

        let (setter, seen) = recorder();
        let config = HookConfig { auto_start: false, ..HookConfig::default() };
        let hook = HeadphoneHook::mount(backend.clone(), config, setter);

        // Fifth failure opens the breaker; every retry after it is skipped
        backend.current_status().await;
        assert!(backend.is_circuit_breaker_open());
        tokio::time::sleep(Duration::from_secs(60)).await;

        let snapshot = hook.snapshot();
        assert!(snapshot.is_circuit_breaker_open);
        assert_eq!(snapshot.retry_count, 3);
        assert!(snapshot.error.is_some());
        assert!(seen.lock().iter().any(|s| s.error.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_initial_status_enters_history() {
        let sim = SimulatedPlatform::with_wired_headphones();
        let backend = backend_for(&sim);
        let warm = backend.current_status().await;
        assert!(backend.cache_info().is_valid);

        let (setter, _) = recorder();
        let hook = HeadphoneHook::mount(backend, HookConfig::default(), setter);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let history = hook.history();
        assert_eq!(history.len(), 1);
        assert!(history[0].same_device(&warm));
        assert!(!hook.snapshot().is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_reports_loading() {
        let sim = SimulatedPlatform::with_wired_headphones();
        let (setter, seen) = recorder();
        let config = HookConfig { auto_start: false, ..HookConfig::default() };
        let hook = HeadphoneHook::mount(backend_for(&sim), config, setter);

        hook.refresh().await;

        let seen = seen.lock();
        assert!(seen[0].is_loading);
        assert!(!seen[1].is_loading);
        assert!(seen[1].has_headphones);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_capped_most_recent_first() {
        let sim = SimulatedPlatform::with_wired_headphones();
        let backend = backend_for(&sim);
        let (setter, _) = recorder();
        let config = HookConfig { auto_start: false, history_limit: 3, ..HookConfig::default() };
        let hook = HeadphoneHook::mount(backend.clone(), config, setter);

        for i in 0..5 {
            let label = format!("Headphones {}", i);
            sim.set_devices(vec![crate::platform::MediaDeviceInfo::output("hp", &label, "g")]);
            backend.invalidate_cache();
            backend.current_status().await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        let history = hook.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].device_name, "Headphones 4");
    }
}
