// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Navigator-property heuristics

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;

use super::Probe;
use crate::detection::{DeviceStatus, DeviceType};
use crate::error::DetectionError;
use crate::platform::Environment;

const MAX_CONFIDENCE: f64 = 0.6;

pub struct NavigatorProbe {
    environment: Option<Arc<dyn Environment>>,
    timeout: Duration,
}

impl NavigatorProbe {
    pub fn new(environment: Option<Arc<dyn Environment>>, timeout: Duration) -> Self {
        Self { environment, timeout }
    }
}

/// Platform-string hint: iOS, then Android, then Mac
fn platform_hint(user_agent: &str, platform: &str) -> Option<(f64, DeviceType)> {
    let ua = user_agent.to_lowercase();
    let platform = platform.to_lowercase();
    if ["iphone", "ipad", "ipod"].iter().any(|p| ua.contains(p) || platform.contains(p)) {
        Some((0.2, DeviceType::Bluetooth))
    } else if ua.contains("android") {
        Some((0.15, DeviceType::Bluetooth))
    } else if platform.contains("mac") {
        Some((0.1, DeviceType::Wired))
    } else {
        None
    }
}

pub fn score_environment(env: &dyn Environment) -> (f64, DeviceType) {
    let (mut confidence, device_type) =
        platform_hint(&env.user_agent(), &env.platform()).unwrap_or((0.0, DeviceType::None));

    if env.hardware_concurrency().map_or(false, |c| c >= 4) {
        confidence += 0.05;
    }
    if env.device_memory_gb().map_or(false, |m| m >= 4.0) {
        confidence += 0.05;
    }
    if matches!(env.effective_connection_type().as_deref(), Some("4g") | Some("5g")) {
        confidence += 0.05;
    }

    (f64::min(confidence, MAX_CONFIDENCE), device_type)
}

#[async_trait]
impl Probe for NavigatorProbe {
    fn name(&self) -> &'static str {
        "navigator-properties"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<DeviceStatus, DetectionError> {
        let env = self
            .environment
            .as_deref()
            .ok_or_else(|| DetectionError::unavailable("navigator"))?;

        let (confidence, device_type) = score_environment(env);
        Ok(DeviceStatus::new(confidence > 0.5, device_type, "", confidence)
            .with_metadata("platform", env.platform()))
    }
}
