// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Device status value types

use std::collections::HashMap;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DetectionError;

/// Kind of audio output the user is listening through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Wired,
    Bluetooth,
    #[default]
    None,
}

impl DeviceType {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceType::Wired => "wired",
            DeviceType::Bluetooth => "bluetooth",
            DeviceType::None => "none",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Best-effort answer to "are headphones connected?"
///
/// Immutable once produced. `is_connected` implies `device_type != None`,
/// and `confidence` is always within [0, 1]; [`DeviceStatus::new`] enforces both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub is_connected: bool,
    pub device_type: DeviceType,
    pub device_name: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    /// Diagnostic only
    pub metadata: HashMap<String, serde_json::Value>,
}

impl DeviceStatus {
    pub fn new(
        is_connected: bool,
        device_type: DeviceType,
        device_name: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            // A connection we cannot classify is not reported as one
            is_connected: is_connected && device_type != DeviceType::None,
            device_type,
            device_name: device_name.into(),
            confidence: clamp_confidence(confidence),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// The explicit "nothing detected" status
    pub fn empty() -> Self {
        Self::new(false, DeviceType::None, "", 0.0)
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.is_connected && self.device_type == DeviceType::None && self.confidence == 0.0
    }

    /// Same physical answer, ignoring timestamp and metadata
    pub fn same_device(&self, other: &DeviceStatus) -> bool {
        self.is_connected == other.is_connected
            && self.device_type == other.device_type
            && self.device_name == other.device_name
    }
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self::empty()
    }
}

/// Clamp scoring arithmetic into [0, 1]; NaN counts as no confidence.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Result of one probe invocation. Never persisted.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub probe: &'static str,
    pub latency: Duration,
    pub result: Result<DeviceStatus, DetectionError>,
}

impl ProbeOutcome {
    pub fn status(&self) -> Option<&DeviceStatus> {
        self.result.as_ref().ok()
    }

    pub fn confidence(&self) -> Option<f64> {
        self.status().map(|s| s.confidence)
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}
