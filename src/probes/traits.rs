// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Probe trait

use std::time::Duration;
use async_trait::async_trait;

use crate::detection::DeviceStatus;
use crate::error::DetectionError;

/// One strategy for estimating headphone status from a platform signal
///
/// Probes only report. Timeouts, failure accounting and result selection
/// belong to the orchestrator.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Stable identifier used in logs and telemetry
    fn name(&self) -> &'static str;

    /// Deadline the orchestrator enforces around [`Probe::probe`]
    fn timeout(&self) -> Duration;

    async fn probe(&self) -> Result<DeviceStatus, DetectionError>;
}
