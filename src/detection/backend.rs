// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Detection backends and platform selection
//!
//! The rest of the application talks to a `dyn DetectionBackend` chosen once
//! at startup from the platform's capabilities.

use std::sync::Arc;
use async_trait::async_trait;
use tracing::info;

use super::{CacheInfo, DeviceStatus, HeadphoneDetector};
use crate::config::Config;
use crate::core::{EventBus, EventCallback, EventType, Subscription};
use crate::platform::{Platform, PlatformKind};
use crate::telemetry::{Metrics, TelemetryEvent};

#[async_trait]
pub trait DetectionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Never fails; the worst answer is the empty status
    async fn current_status(&self) -> DeviceStatus;

    fn start_listening(&self) -> bool;

    fn stop_listening(&self) -> bool;

    fn events(&self) -> &EventBus;

    fn add_listener(&self, event_type: EventType, callback: EventCallback) -> Subscription {
        self.events().add_listener(event_type, callback)
    }

    fn remove_all_listeners(&self, event_type: Option<EventType>) {
        self.events().remove_all_listeners(event_type);
    }

    fn metrics(&self) -> Metrics;

    fn reset_circuit_breaker(&self);

    fn is_circuit_breaker_open(&self) -> bool;

    fn invalidate_cache(&self);

    fn cache_info(&self) -> CacheInfo;

    fn export_telemetry(&self) -> Vec<TelemetryEvent>;
}

#[async_trait]
impl DetectionBackend for HeadphoneDetector {
    fn name(&self) -> &'static str {
        "probe-chain"
    }

    async fn current_status(&self) -> DeviceStatus {
        HeadphoneDetector::current_status(self).await
    }

    fn start_listening(&self) -> bool {
        HeadphoneDetector::start_listening(self)
    }

    fn stop_listening(&self) -> bool {
        HeadphoneDetector::stop_listening(self)
    }

    fn events(&self) -> &EventBus {
        HeadphoneDetector::events(self)
    }

    fn metrics(&self) -> Metrics {
        HeadphoneDetector::metrics(self)
    }

    fn reset_circuit_breaker(&self) {
        HeadphoneDetector::reset_circuit_breaker(self)
    }

    fn is_circuit_breaker_open(&self) -> bool {
        HeadphoneDetector::is_circuit_breaker_open(self)
    }

    fn invalidate_cache(&self) {
        HeadphoneDetector::invalidate_cache(self)
    }

    fn cache_info(&self) -> CacheInfo {
        HeadphoneDetector::cache_info(self)
    }

    fn export_telemetry(&self) -> Vec<TelemetryEvent> {
        HeadphoneDetector::export_telemetry(self)
    }
}

/// Backend for platforms with nothing to probe
#[derive(Default)]
pub struct NullBackend {
    events: EventBus,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DetectionBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn current_status(&self) -> DeviceStatus {
        DeviceStatus::empty()
    }

    fn start_listening(&self) -> bool {
        false
    }

    fn stop_listening(&self) -> bool {
        false
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    fn metrics(&self) -> Metrics {
        Metrics::default()
    }

    fn reset_circuit_breaker(&self) {}

    fn is_circuit_breaker_open(&self) -> bool {
        false
    }

    fn invalidate_cache(&self) {}

    fn cache_info(&self) -> CacheInfo {
        CacheInfo {
            has_cached: false,
            age_ms: None,
            expires_in_ms: None,
            is_valid: false,
        }
    }

    fn export_telemetry(&self) -> Vec<TelemetryEvent> {
        Vec::new()
    }
}

/// Pick the backend for the running platform
pub fn select_backend(platform: Platform, config: &Config) -> Arc<dyn DetectionBackend> {
    let backend: Arc<dyn DetectionBackend> = match platform.kind {
        PlatformKind::Web | PlatformKind::Native => {
            let detector = HeadphoneDetector::new(platform, config);
            info!("Probe chain: {}", detector.probe_names().join(" -> "));
            Arc::new(detector)
        }
        PlatformKind::Unsupported => Arc::new(NullBackend::new()),
    };
    info!("Using '{}' detection backend", backend.name());
    backend
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unsupported_platform_gets_null_backend() {
        let backend = select_backend(Platform::unsupported(), &Config::default());
        assert_eq!(backend.name(), "null");
        assert!(backend.current_status().await.is_empty());
        assert!(!backend.start_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_route_backend() {
        let sim = crate::platform::SimulatedPlatform::new();
        sim.set_route(crate::platform::RoutePort::Wired, "Headphones");

        let backend = select_backend(sim.platform(PlatformKind::Native), &Config::default());
        assert_eq!(backend.name(), "probe-chain");

        let status = backend.current_status().await;
        assert!(status.is_connected);
        assert_eq!(status.device_type, crate::detection::DeviceType::Wired);
        assert!(backend.cache_info().is_valid);
    }
}
