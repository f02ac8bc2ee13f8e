// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! OS audio-route probe used on native platforms

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;

use super::Probe;
use crate::detection::{DeviceStatus, DeviceType};
use crate::error::DetectionError;
use crate::platform::{AudioRoute, RoutePort};

pub struct NativeRouteProbe {
    route: Option<Arc<dyn AudioRoute>>,
    timeout: Duration,
}

impl NativeRouteProbe {
    pub fn new(route: Option<Arc<dyn AudioRoute>>, timeout: Duration) -> Self {
        Self { route, timeout }
    }
}

#[async_trait]
impl Probe for NativeRouteProbe {
    fn name(&self) -> &'static str {
        "native-audio-route"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<DeviceStatus, DetectionError> {
        let route = self
            .route
            .as_deref()
            .ok_or_else(|| DetectionError::unavailable("audio route"))?
            .current_route()
            .await?;

        // The OS knows the active port, so confidence is near certain either way
        let status = match route.port {
            RoutePort::Wired => DeviceStatus::new(true, DeviceType::Wired, route.name, 1.0),
            RoutePort::Bluetooth => DeviceStatus::new(true, DeviceType::Bluetooth, route.name, 1.0),
            RoutePort::Speaker | RoutePort::Other => {
                DeviceStatus::new(false, DeviceType::None, route.name, 0.9)
            }
        };
        Ok(status.with_metadata("source", "audio-route"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SimulatedPlatform;

    #[tokio::test]
    async fn test_route_ports() {
        let sim = SimulatedPlatform::new();
        let probe = NativeRouteProbe::new(Some(sim.clone()), Duration::from_secs(1));

        let speaker = probe.probe().await.unwrap();
        assert!(!speaker.is_connected);
        assert_eq!(speaker.confidence, 0.9);

        sim.set_route(RoutePort::Bluetooth, "AirPods Max");
        let bt = probe.probe().await.unwrap();
        assert!(bt.is_connected);
        assert_eq!(bt.device_type, DeviceType::Bluetooth);
        assert_eq!(bt.device_name, "AirPods Max");
    }
}
