// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Media-feature heuristics

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;

use super::Probe;
use crate::detection::{DeviceStatus, DeviceType};
use crate::error::DetectionError;
use crate::platform::Environment;

pub const MEDIA_QUERIES: [&str; 5] = [
    "(prefers-reduced-motion: reduce)",
    "(min-resolution: 2dppx)",
    "(color-gamut: p3)",
    "(hover: hover)",
    "(pointer: fine)",
];

const QUERY_WEIGHT: f64 = 0.1;
const MOBILE_BONUS: f64 = 0.3;
const MAX_CONFIDENCE: f64 = 0.7;

const MOBILE_PATTERNS: [&str; 8] = [
    "android", "webos", "iphone", "ipad", "ipod", "blackberry", "iemobile", "opera mini",
];

pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    MOBILE_PATTERNS.iter().any(|p| ua.contains(p))
}

pub struct MediaQueryProbe {
    environment: Option<Arc<dyn Environment>>,
    timeout: Duration,
}

impl MediaQueryProbe {
    pub fn new(environment: Option<Arc<dyn Environment>>, timeout: Duration) -> Self {
        Self { environment, timeout }
    }
}

#[async_trait]
impl Probe for MediaQueryProbe {
    fn name(&self) -> &'static str {
        "media-query-heuristics"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<DeviceStatus, DetectionError> {
        let env = self
            .environment
            .as_deref()
            .ok_or_else(|| DetectionError::unavailable("media queries"))?;

        let mut confidence = 0.0;
        let mut matched = 0u32;
        for query in MEDIA_QUERIES {
            let hit = env
                .matches_media(query)
                .ok_or_else(|| DetectionError::unavailable("media queries"))?;
            if hit {
                confidence += QUERY_WEIGHT;
                matched += 1;
            }
        }

        let mobile = is_mobile_user_agent(&env.user_agent());
        if mobile {
            confidence += MOBILE_BONUS;
        }
        let confidence: f64 = f64::min(confidence, MAX_CONFIDENCE);

        let device_type = if mobile { DeviceType::Bluetooth } else { DeviceType::Wired };
        Ok(DeviceStatus::new(confidence > 0.5, device_type, "", confidence)
            .with_metadata("matchedQueries", matched)
            .with_metadata("mobile", mobile))
    }
}
