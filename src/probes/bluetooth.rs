// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Bluetooth availability probe

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tracing::debug;

use super::keywords::score_label;
use super::Probe;
use crate::detection::{DeviceStatus, DeviceType};
use crate::error::DetectionError;
use crate::platform::Bluetooth;

pub const ACTIVE_CONNECTION_BONUS: f64 = 0.3;
pub const DISCOVERED_DEVICE_CONFIDENCE: f64 = 0.85;

pub struct BluetoothProbe {
    bluetooth: Option<Arc<dyn Bluetooth>>,
    timeout: Duration,
}

impl BluetoothProbe {
    pub fn new(bluetooth: Option<Arc<dyn Bluetooth>>, timeout: Duration) -> Self {
        Self { bluetooth, timeout }
    }
}

#[async_trait]
impl Probe for BluetoothProbe {
    fn name(&self) -> &'static str {
        "bluetooth-availability"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<DeviceStatus, DetectionError> {
        let bluetooth = self
            .bluetooth
            .as_deref()
            .ok_or_else(|| DetectionError::unavailable("bluetooth"))?;

        // A device bound earlier and still connected needs no query
        if let Some(device) = bluetooth.bound_device().filter(|d| d.connected) {
            let name = device.name.unwrap_or_else(|| "Bluetooth Device".to_string());
            let confidence = (score_label(&name).score + ACTIVE_CONNECTION_BONUS).min(1.0);
            debug!(device = %name, confidence, "Reusing bound bluetooth device");
            return Ok(DeviceStatus::new(confidence > 0.5, DeviceType::Bluetooth, name, confidence)
                .with_metadata("deviceId", device.id)
                .with_metadata("source", "bound"));
        }

        if !bluetooth.is_available().await? {
            return Err(DetectionError::unavailable("bluetooth adapter disabled"));
        }

        match bluetooth.find_audio_device().await? {
            Some(device) => {
                let name = device.name.unwrap_or_else(|| "Bluetooth Audio Device".to_string());
                Ok(DeviceStatus::new(true, DeviceType::Bluetooth, name, DISCOVERED_DEVICE_CONFIDENCE)
                    .with_metadata("deviceId", device.id)
                    .with_metadata("source", "query"))
            }
            None => Err(DetectionError::NotFound("no bluetooth audio devices".to_string())),
        }
    }
}
