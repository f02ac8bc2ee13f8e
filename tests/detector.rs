// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! End-to-end detector behavior

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;

use headsense::core::listener;
use headsense::probes::Probe;
use headsense::{
    Config, DetectionError, DetectorEvent, DeviceStatus, DeviceType, EventType,
    HeadphoneDetector, Platform,
};

struct CountingProbe {
    result: Mutex<Result<DeviceStatus, DetectionError>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl CountingProbe {
    fn new(result: Result<DeviceStatus, DetectionError>) -> Arc<Self> {
        Self::with_delay(result, Duration::from_millis(1))
    }

    fn with_delay(result: Result<DeviceStatus, DetectionError>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(result),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn set(&self, result: Result<DeviceStatus, DetectionError>) {
        *self.result.lock() = result;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for CountingProbe {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn probe(&self) -> Result<DeviceStatus, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.result.lock().clone()
    }
}

fn headphones() -> DeviceStatus {
    DeviceStatus::new(true, DeviceType::Wired, "Studio Headphones", 0.9)
}

fn failing() -> Result<DeviceStatus, DetectionError> {
    Err(DetectionError::transient("device busy"))
}

fn detector_with(probe: &Arc<CountingProbe>) -> HeadphoneDetector {
    HeadphoneDetector::with_probes(
        Platform::web(),
        vec![probe.clone() as Arc<dyn Probe>],
        &Config::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn breaker_opens_and_skips_probes() {
    let probe = CountingProbe::new(Ok(headphones()));
    let det = detector_with(&probe);
    let adopted = det.current_status().await;

    probe.set(failing());
    for _ in 0..5 {
        det.invalidate_cache();
        det.current_status().await;
    }
    assert!(det.is_circuit_breaker_open());
    assert_eq!(probe.calls(), 6);

    // Inside the 2^5 * 10s window: last known status, no probing
    det.invalidate_cache();
    let status = det.current_status().await;
    assert!(status.same_device(&adopted));
    assert_eq!(probe.calls(), 6);

    tokio::time::advance(Duration::from_secs(100)).await;
    det.current_status().await;
    assert_eq!(probe.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn successes_decay_failures_until_closed() {
    let probe = CountingProbe::new(failing());
    let det = detector_with(&probe);

    for _ in 0..5 {
        det.current_status().await;
    }
    assert!(det.is_circuit_breaker_open());
    assert_eq!(det.circuit_breaker_state().failure_count, 5);

    tokio::time::advance(Duration::from_secs(321)).await;
    probe.set(Ok(headphones()));

    let status = det.current_status().await;
    assert!(status.is_connected);
    assert_eq!(det.circuit_breaker_state().failure_count, 4);
    assert!(det.is_circuit_breaker_open());

    for _ in 0..4 {
        det.invalidate_cache();
        det.current_status().await;
    }
    assert_eq!(det.circuit_breaker_state().failure_count, 0);
    assert!(!det.is_circuit_breaker_open());
}

#[tokio::test(start_paused = true)]
async fn reset_closes_breaker() {
    let probe = CountingProbe::new(failing());
    let det = detector_with(&probe);
    for _ in 0..5 {
        det.current_status().await;
    }
    assert!(det.is_circuit_breaker_open());

    det.reset_circuit_breaker();
    let state = det.circuit_breaker_state();
    assert!(!state.is_open);
    assert_eq!(state.failure_count, 0);
    assert_eq!(state.since_last_failure_ms, None);

    det.current_status().await;
    assert_eq!(probe.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_share_one_pass() {
    let probe = CountingProbe::with_delay(Ok(headphones()), Duration::from_millis(200));
    let det = detector_with(&probe);

    let (a, b) = tokio::join!(det.current_status(), det.current_status());
    assert_eq!(probe.calls(), 1);
    assert_eq!(a, b);
}

#[tokio::test(start_paused = true)]
async fn pass_outlives_a_dropped_caller() {
    let probe = CountingProbe::with_delay(Ok(headphones()), Duration::from_millis(400));
    let det = detector_with(&probe);

    let changes = Arc::new(AtomicUsize::new(0));
    let counter = changes.clone();
    let _sub = det.add_listener(
        EventType::StatusChanged,
        listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    let caller = {
        let det = det.clone();
        tokio::spawn(async move { det.current_status().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    caller.abort();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(changes.load(Ordering::SeqCst), 1);
    assert!(det.cache_info().has_cached);
    assert!(det.metrics().detection_latency < 1000.0);

    // Much later: a fresh pass, timed on its own
    tokio::time::advance(Duration::from_secs(600)).await;
    assert!(det.current_status().await.is_connected);
    assert_eq!(probe.calls(), 2);
    assert!(det.metrics().detection_latency < 1000.0);
}

#[tokio::test(start_paused = true)]
async fn invalidate_forces_new_pass() {
    let probe = CountingProbe::new(Ok(headphones()));
    let det = detector_with(&probe);

    det.current_status().await;
    det.current_status().await;
    assert_eq!(probe.calls(), 1);

    det.invalidate_cache();
    assert!(!det.cache_info().has_cached);
    det.current_status().await;
    assert_eq!(probe.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn telemetry_flushes_at_one_hundred_events() {
    let probe = CountingProbe::new(Ok(headphones()));
    let det = detector_with(&probe);

    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    let _sub = det.add_listener(
        EventType::PerformanceMetrics,
        listener(move |event| {
            if let DetectorEvent::PerformanceMetrics(report) = event {
                sink.lock().push(report.events.len());
            }
        }),
    );

    // Each pass logs one probe attempt and one adoption
    for _ in 0..49 {
        det.invalidate_cache();
        det.current_status().await;
    }
    assert!(reports.lock().is_empty());
    assert_eq!(det.export_telemetry().len(), 98);

    det.invalidate_cache();
    det.current_status().await;
    assert_eq!(*reports.lock(), vec![100]);
    assert!(det.export_telemetry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn explicit_flush_emits_and_clears() {
    let probe = CountingProbe::new(Ok(headphones()));
    let det = detector_with(&probe);

    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    let _sub = det.add_listener(
        EventType::PerformanceMetrics,
        listener(move |event| {
            if let DetectorEvent::PerformanceMetrics(report) = event {
                sink.lock().push(report.events.len());
            }
        }),
    );

    for _ in 0..3 {
        det.invalidate_cache();
        det.current_status().await;
    }
    assert_eq!(det.export_telemetry().len(), 6);

    let report = det.flush_telemetry();
    assert_eq!(report.events.len(), 6);
    assert_eq!(report.metrics.detections, 3);
    assert_eq!(*reports.lock(), vec![6]);
    assert!(det.export_telemetry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn status_always_satisfies_invariant() {
    let probe = CountingProbe::new(Ok(DeviceStatus::new(true, DeviceType::None, "???", 3.5)));
    let det = detector_with(&probe);

    let status = det.current_status().await;
    assert!(!status.is_connected);
    assert!((0.0..=1.0).contains(&status.confidence));
}

#[cfg(feature = "simulator")]
mod simulated {
    use super::*;
    use headsense::platform::{MediaDeviceInfo, PlatformKind, SimulatedPlatform};

    #[tokio::test(start_paused = true)]
    async fn sony_bluetooth_headphones_adopted() {
        let sim = SimulatedPlatform::new();
        sim.plug_in(MediaDeviceInfo::output("bt-9", "Sony Bluetooth Headphones", "grp-bt"));
        let det = HeadphoneDetector::new(sim.platform(PlatformKind::Web), &Config::default());
        assert_eq!(det.probe_names()[0], "enumerate-devices");

        let status = det.current_status().await;
        assert_eq!(status.device_type, DeviceType::Bluetooth);
        assert!(status.confidence >= 0.8);
        assert!(status.is_connected);
        assert_eq!(status.metadata["probe"], "enumerate-devices");
    }

    #[tokio::test(start_paused = true)]
    async fn device_change_triggers_redetection() {
        let sim = SimulatedPlatform::with_wired_headphones();
        let det = HeadphoneDetector::new(sim.platform(PlatformKind::Web), &Config::default());

        assert_eq!(det.current_status().await.device_type, DeviceType::Wired);
        assert!(det.start_listening());
        let enumerated = sim.enumerate_calls();

        // Two notifications inside the debounce window, one pass
        sim.unplug("hp-wired");
        sim.plug_in(MediaDeviceInfo::output("bt-2", "Jabra Elite Buds", "grp-bt"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sim.enumerate_calls(), enumerated + 1);

        let status = det.current_status().await;
        assert_eq!(status.device_type, DeviceType::Bluetooth);
        assert_eq!(det.metrics().device_count, 2);
        assert!(det.stop_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_is_reported() {
        let sim = SimulatedPlatform::new();
        sim.set_permission_granted(false);
        sim.set_audio_output(
            headsense::platform::AudioOutputInfo {
                sample_rate: 8000.0,
                max_channel_count: 1,
                output_latency: None,
            },
            false,
        );
        let det = HeadphoneDetector::new(sim.platform(PlatformKind::Web), &Config::default());

        let denied = Arc::new(AtomicUsize::new(0));
        let counter = denied.clone();
        let _sub = det.add_listener(
            EventType::Error,
            listener(move |event| {
                if let DetectorEvent::Error(failure) = event {
                    if failure.permission_denied() {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }),
        );

        assert!(det.current_status().await.is_empty());
        assert_eq!(denied.load(Ordering::SeqCst), 1);
        let metrics = det.metrics();
        assert_eq!(metrics.probe_stats["enumerate-devices"].failures, 1);
    }
}
