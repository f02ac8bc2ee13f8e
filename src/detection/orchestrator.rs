// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Detection orchestrator
//!
//! Runs the probe chain behind the circuit breaker and result cache,
//! adopts the best answer and broadcasts it. Concurrent callers share one
//! in-flight pass.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CacheInfo, CircuitBreaker, CircuitBreakerState, DeviceStatus, ProbeOutcome, ResultCache};
use crate::config::{Config, DetectionConfig};
use crate::core::{DetectorEvent, EventBus, EventCallback, EventType, Scheduler, Subscription};
use crate::error::DetectionError;
use crate::platform::Platform;
use crate::probes::{build_probe_chain, Probe};
use crate::telemetry::{Metrics, PerformanceReport, Telemetry, TelemetryEvent};

const LISTENER_TASK: &str = "device-change-listener";

/// One probe's failure inside a failed pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeError {
    pub probe: String,
    pub kind: String,
    pub message: String,
}

impl ProbeError {
    fn from_error(probe: &str, error: &DetectionError) -> Self {
        Self {
            probe: probe.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Payload of an `error` event: a whole pass produced nothing adoptable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionFailure {
    pub message: String,
    pub failure_count: u32,
    pub circuit_open: bool,
    pub timestamp: DateTime<Utc>,
    pub probe_errors: Vec<ProbeError>,
}

impl DetectionFailure {
    pub fn permission_denied(&self) -> bool {
        self.probe_errors.iter().any(|e| e.kind == "permission_denied")
    }
}

struct DetectorState {
    cache: ResultCache,
    breaker: CircuitBreaker,
    last_known: Option<DeviceStatus>,
    seen_devices: HashSet<String>,
}

type DetectionPass = Shared<BoxFuture<'static, DeviceStatus>>;

struct DetectorInner {
    config: DetectionConfig,
    platform: Platform,
    probes: Vec<Arc<dyn Probe>>,
    state: Mutex<DetectorState>,
    in_flight: Mutex<Option<DetectionPass>>,
    events: EventBus,
    telemetry: Telemetry,
    scheduler: Scheduler,
    listening: AtomicBool,
}

/// Multi-probe headphone detector
///
/// Cheap to clone; clones share all state. Construct one per session at the
/// composition root and hand clones to consumers.
#[derive(Clone)]
pub struct HeadphoneDetector {
    inner: Arc<DetectorInner>,
}

impl HeadphoneDetector {
    /// Detector with the probe chain for `platform.kind`
    pub fn new(platform: Platform, config: &Config) -> Self {
        let probes = build_probe_chain(&platform, &config.probes);
        Self::with_probes(platform, probes, config)
    }

    /// Detector with an explicit probe chain, run in the given order
    pub fn with_probes(platform: Platform, probes: Vec<Arc<dyn Probe>>, config: &Config) -> Self {
        info!(
            "Detector created with {} probe(s) on {:?}",
            probes.len(),
            platform.kind
        );
        Self {
            inner: Arc::new(DetectorInner {
                config: config.detection.clone(),
                platform,
                probes,
                state: Mutex::new(DetectorState {
                    cache: ResultCache::new(config.detection.cache_expiration()),
                    breaker: CircuitBreaker::from_config(&config.detection),
                    last_known: None,
                    seen_devices: HashSet::new(),
                }),
                in_flight: Mutex::new(None),
                events: EventBus::new(),
                telemetry: Telemetry::new(&config.telemetry),
                scheduler: Scheduler::new(),
                listening: AtomicBool::new(false),
            }),
        }
    }

    /// Best current answer. Never fails; degrades to the last known or empty status.
    pub async fn current_status(&self) -> DeviceStatus {
        {
            let now = Instant::now();
            let state = self.inner.state.lock();
            if state.breaker.should_keep_open(now) {
                debug!(
                    failures = state.breaker.failure_count(),
                    "Circuit breaker open, skipping detection"
                );
                return state.last_known.clone().unwrap_or_default();
            }
            if let Some(cached) = state.cache.get(now) {
                return cached.clone();
            }
        }

        let pass = {
            let mut slot = self.inner.in_flight.lock();
            match slot.clone() {
                Some(pass) => {
                    debug!("Joining in-flight detection");
                    pass
                }
                None => {
                    let pass = self.spawn_pass();
                    *slot = Some(pass.clone());
                    pass
                }
            }
        };

        pass.await
    }

    /// Start a pass on the runtime. It runs to completion even if every
    /// caller awaiting it goes away.
    fn spawn_pass(&self) -> DetectionPass {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let _slot = ClearInFlight(&inner);
            inner.run_detection().await
        });

        let weak = Arc::downgrade(&self.inner);
        async move {
            match handle.await {
                Ok(status) => status,
                Err(e) => {
                    warn!("Detection pass did not complete: {}", e);
                    weak.upgrade()
                        .and_then(|inner| inner.state.lock().last_known.clone())
                        .unwrap_or_default()
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Re-detect whenever the platform reports a device change. Returns false
    /// when already listening or when the platform has no change stream.
    pub fn start_listening(&self) -> bool {
        if self.inner.listening.swap(true, Ordering::SeqCst) {
            return false;
        }

        let Some(mut changes) = self.inner.platform.device_changes() else {
            debug!("Platform offers no device-change notifications");
            self.inner.listening.store(false, Ordering::SeqCst);
            return false;
        };

        let weak: Weak<DetectorInner> = Arc::downgrade(&self.inner);
        let debounce = self.inner.config.device_change_debounce();

        let started = self.inner.scheduler.spawn(LISTENER_TASK, async move {
            'listen: loop {
                if let Err(RecvError::Closed) = changes.recv().await {
                    break;
                }
                // Coalesce a burst of notifications into one pass
                loop {
                    match tokio::time::timeout(debounce, changes.recv()).await {
                        Err(_) => break,
                        Ok(Err(RecvError::Closed)) => break 'listen,
                        Ok(_) => continue,
                    }
                }

                let Some(inner) = weak.upgrade() else { break };
                let detector = HeadphoneDetector { inner };
                debug!("Device change detected, re-running detection");
                detector.invalidate_cache();
                detector.current_status().await;
            }

            if let Some(inner) = weak.upgrade() {
                inner.listening.store(false, Ordering::SeqCst);
            }
        });

        if !started {
            self.inner.listening.store(false, Ordering::SeqCst);
            return false;
        }
        info!("Listening for device changes");
        true
    }

    pub fn stop_listening(&self) -> bool {
        if !self.inner.listening.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.inner.scheduler.cancel(LISTENER_TASK);
        info!("Stopped listening for device changes");
        true
    }

    pub fn is_listening(&self) -> bool {
        self.inner.listening.load(Ordering::SeqCst)
    }

    pub fn add_listener(&self, event_type: EventType, callback: EventCallback) -> Subscription {
        self.inner.events.add_listener(event_type, callback)
    }

    pub fn remove_all_listeners(&self, event_type: Option<EventType>) {
        self.inner.events.remove_all_listeners(event_type);
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn metrics(&self) -> Metrics {
        self.inner.telemetry.metrics()
    }

    pub fn reset_circuit_breaker(&self) {
        self.inner.state.lock().breaker.reset();
        info!("Circuit breaker reset");
    }

    pub fn is_circuit_breaker_open(&self) -> bool {
        self.inner.state.lock().breaker.is_open()
    }

    pub fn circuit_breaker_state(&self) -> CircuitBreakerState {
        self.inner.state.lock().breaker.state(Instant::now())
    }

    pub fn invalidate_cache(&self) {
        self.inner.state.lock().cache.invalidate();
        debug!("Result cache invalidated");
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.inner.state.lock().cache.info(Instant::now())
    }

    /// Unflushed telemetry, left in place
    pub fn export_telemetry(&self) -> Vec<TelemetryEvent> {
        self.inner.telemetry.export()
    }

    /// Flush buffered telemetry now and broadcast it as `performanceMetrics`
    pub fn flush_telemetry(&self) -> PerformanceReport {
        let report = self.inner.telemetry.flush();
        self.inner
            .events
            .emit(DetectorEvent::PerformanceMetrics(report.clone()));
        report
    }

    pub fn probe_names(&self) -> Vec<&'static str> {
        self.inner.probes.iter().map(|p| p.name()).collect()
    }
}

/// Empties the in-flight slot when a pass ends, however it ends
struct ClearInFlight<'a>(&'a DetectorInner);

impl Drop for ClearInFlight<'_> {
    fn drop(&mut self) {
        *self.0.in_flight.lock() = None;
    }
}

impl DetectorInner {
    async fn run_detection(&self) -> DeviceStatus {
        let started = Instant::now();
        let mut outcomes: Vec<ProbeOutcome> = Vec::with_capacity(self.probes.len());

        for probe in &self.probes {
            let outcome = self.run_probe(&**probe).await;
            self.telemetry.record_probe(&outcome);
            self.log(
                "probe_attempt",
                json!({
                    "probe": outcome.probe,
                    "success": outcome.result.is_ok(),
                    "latencyMs": outcome.latency_ms(),
                    "confidence": outcome.confidence(),
                    "error": outcome.result.as_ref().err().map(|e| e.to_string()),
                }),
            );

            let conclusive = outcome
                .confidence()
                .map_or(false, |c| c >= self.config.accuracy_threshold);
            outcomes.push(outcome);
            if conclusive {
                debug!("Confidence threshold reached, skipping remaining probes");
                break;
            }
        }

        // Strictly greater keeps the earlier, more authoritative probe on ties
        let mut best: Option<&ProbeOutcome> = None;
        for outcome in &outcomes {
            if let Some(confidence) = outcome.confidence() {
                if best.and_then(|b| b.confidence()).map_or(true, |c| confidence > c) {
                    best = Some(outcome);
                }
            }
        }

        match best.and_then(|o| o.status().map(|s| (o.probe, s))) {
            Some((probe, status)) if status.confidence > self.config.min_adopt_confidence => {
                let status = status.clone().with_metadata("probe", probe);
                self.adopt(status, started.elapsed())
            }
            _ => self.fail(&outcomes, started.elapsed()),
        }
    }

    async fn run_probe(&self, probe: &dyn Probe) -> ProbeOutcome {
        let started = Instant::now();
        let timeout = probe.timeout();

        let result = match tokio::time::timeout(timeout, probe.probe()).await {
            Ok(result) => result,
            Err(_) => Err(DetectionError::Timeout {
                probe: probe.name().to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        match &result {
            Ok(status) => debug!(
                probe = probe.name(),
                confidence = status.confidence,
                connected = status.is_connected,
                "Probe succeeded"
            ),
            Err(DetectionError::PermissionDenied(reason)) => {
                warn!(probe = probe.name(), "Permission denied: {}", reason)
            }
            Err(e) => debug!(probe = probe.name(), "Probe failed: {}", e),
        }

        ProbeOutcome {
            probe: probe.name(),
            latency: started.elapsed(),
            result,
        }
    }

    fn adopt(&self, status: DeviceStatus, latency: Duration) -> DeviceStatus {
        let device_count = {
            let mut state = self.state.lock();
            state.cache.store(status.clone(), Instant::now());

            let was_open = state.breaker.is_open();
            state.breaker.record_success();
            if was_open && !state.breaker.is_open() {
                info!("Circuit breaker closed");
            }

            if status.is_connected && !status.device_name.is_empty() {
                state.seen_devices.insert(status.device_name.clone());
            }
            state.last_known = Some(status.clone());
            state.seen_devices.len()
        };

        self.telemetry.record_adoption(&status, latency, device_count);
        self.log(
            "detection_complete",
            json!({
                "connected": status.is_connected,
                "deviceType": status.device_type.label(),
                "confidence": status.confidence,
                "latencyMs": latency.as_secs_f64() * 1000.0,
            }),
        );

        info!(
            "Adopted {} '{}' (connected: {}, confidence {:.2})",
            status.device_type, status.device_name, status.is_connected, status.confidence
        );
        self.events.emit(DetectorEvent::StatusChanged(status.clone()));
        status
    }

    fn fail(&self, outcomes: &[ProbeOutcome], latency: Duration) -> DeviceStatus {
        let (failure_count, circuit_open, fallback) = {
            let mut state = self.state.lock();
            let was_open = state.breaker.is_open();
            state.breaker.record_failure(Instant::now());
            if !was_open && state.breaker.is_open() {
                warn!(
                    "Circuit breaker opened after {} failed detections (backoff {:?})",
                    state.breaker.failure_count(),
                    state.breaker.backoff()
                );
            }
            (
                state.breaker.failure_count(),
                state.breaker.is_open(),
                state.last_known.clone().unwrap_or_default(),
            )
        };

        let message = format!(
            "no probe exceeded confidence {} ({} attempted)",
            self.config.min_adopt_confidence,
            outcomes.len()
        );
        self.telemetry.record_failure(&message, latency);
        self.log(
            "detection_failed",
            json!({
                "failureCount": failure_count,
                "circuitOpen": circuit_open,
                "latencyMs": latency.as_secs_f64() * 1000.0,
            }),
        );
        warn!("Detection failed: {}", message);

        let failure = DetectionFailure {
            message,
            failure_count,
            circuit_open,
            timestamp: Utc::now(),
            probe_errors: outcomes
                .iter()
                .filter_map(|o| o.result.as_ref().err().map(|e| ProbeError::from_error(o.probe, e)))
                .collect(),
        };
        self.events.emit(DetectorEvent::Error(failure));
        fallback
    }

    fn log(&self, name: &str, data: serde_json::Value) {
        if let Some(report) = self.telemetry.log_event(name, data) {
            debug!("Telemetry batch of {} events flushed", report.events.len());
            self.events.emit(DetectorEvent::PerformanceMetrics(report));
        }
    }
}
