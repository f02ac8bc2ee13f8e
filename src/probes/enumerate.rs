// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Media-device enumeration probe

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tracing::debug;

use super::keywords::score_label;
use super::Probe;
use crate::detection::{clamp_confidence, DeviceStatus, DeviceType};
use crate::error::DetectionError;
use crate::platform::{MediaDeviceInfo, MediaDeviceKind, MediaDevices};

pub const NON_DEFAULT_ID_BONUS: f64 = 0.3;
pub const GROUP_ID_BONUS: f64 = 0.2;
pub const LABEL_PRESENT_BONUS: f64 = 0.4;
pub const LABEL_MISSING_PENALTY: f64 = -0.2;
pub const DEFAULT_DEVICE_PENALTY: f64 = -0.3;

/// Scores every audio output by its label and identifiers and reports the best
pub struct EnumerateDevicesProbe {
    devices: Option<Arc<dyn MediaDevices>>,
    timeout: Duration,
    labels_unlocked: AtomicBool,
}

impl EnumerateDevicesProbe {
    pub fn new(devices: Option<Arc<dyn MediaDevices>>, timeout: Duration) -> Self {
        Self {
            devices,
            timeout,
            labels_unlocked: AtomicBool::new(false),
        }
    }

    /// One-shot permission grant; later calls are free
    async fn ensure_labels(&self, devices: &dyn MediaDevices) -> Result<(), DetectionError> {
        if self.labels_unlocked.load(Ordering::SeqCst) {
            return Ok(());
        }
        devices.unlock_labels().await?;
        self.labels_unlocked.store(true, Ordering::SeqCst);
        debug!("Media permission granted, device labels unlocked");
        Ok(())
    }
}

/// Confidence and type for one output device
pub fn score_device(device: &MediaDeviceInfo) -> (f64, DeviceType) {
    let label = score_label(&device.label);
    let mut confidence = label.score;

    let is_default = device.device_id == "default"
        || device.label.to_lowercase().contains("default");

    if !device.device_id.is_empty() && device.device_id != "default" {
        confidence += NON_DEFAULT_ID_BONUS;
    }
    if !device.group_id.is_empty() {
        confidence += GROUP_ID_BONUS;
    }
    if device.label.is_empty() {
        confidence += LABEL_MISSING_PENALTY;
    } else {
        confidence += LABEL_PRESENT_BONUS;
    }
    if is_default {
        confidence += DEFAULT_DEVICE_PENALTY;
    }

    (clamp_confidence(confidence), label.device_type)
}

#[async_trait]
impl Probe for EnumerateDevicesProbe {
    fn name(&self) -> &'static str {
        "enumerate-devices"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self) -> Result<DeviceStatus, DetectionError> {
        let devices = self
            .devices
            .as_deref()
            .ok_or_else(|| DetectionError::unavailable("media device enumeration"))?;

        self.ensure_labels(devices).await?;

        let outputs: Vec<MediaDeviceInfo> = devices
            .enumerate()
            .await?
            .into_iter()
            .filter(|d| d.kind == MediaDeviceKind::AudioOutput)
            .collect();

        let mut best: Option<(&MediaDeviceInfo, f64, DeviceType)> = None;
        for device in &outputs {
            let (confidence, device_type) = score_device(device);
            debug!(device = %device.label, confidence, "Scored output device");
            if best.map_or(true, |(_, c, _)| confidence > c) {
                best = Some((device, confidence, device_type));
            }
        }

        let (device, confidence, device_type) =
            best.ok_or_else(|| DetectionError::NotFound("no audio output devices".to_string()))?;

        Ok(DeviceStatus::new(confidence > 0.5, device_type, device.label.clone(), confidence)
            .with_metadata("deviceId", device.device_id.clone())
            .with_metadata("groupId", device.group_id.clone())
            .with_metadata("outputCount", outputs.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FixedDevices {
        devices: Mutex<Vec<MediaDeviceInfo>>,
        deny: bool,
    }

    impl FixedDevices {
        fn new(devices: Vec<MediaDeviceInfo>) -> Arc<Self> {
            Arc::new(Self { devices: Mutex::new(devices), deny: false })
        }
    }

    #[async_trait]
    impl MediaDevices for FixedDevices {
        async fn unlock_labels(&self) -> Result<(), DetectionError> {
            if self.deny {
                Err(DetectionError::PermissionDenied("denied".into()))
            } else {
                Ok(())
            }
        }

        async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, DetectionError> {
            Ok(self.devices.lock().clone())
        }
    }

    fn probe_for(devices: Vec<MediaDeviceInfo>) -> EnumerateDevicesProbe {
        EnumerateDevicesProbe::new(Some(FixedDevices::new(devices)), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_sony_bluetooth_headphones() {
        let probe = probe_for(vec![
            MediaDeviceInfo::output("default", "Default - Speakers", "g0"),
            MediaDeviceInfo::output("bt-77", "Sony Bluetooth Headphones", "g1"),
        ]);
        let status = probe.probe().await.unwrap();
        assert_eq!(status.device_type, DeviceType::Bluetooth);
        assert!(status.confidence >= 0.8);
        assert!(status.is_connected);
        assert_eq!(status.device_name, "Sony Bluetooth Headphones");
    }

    #[test]
    fn test_hdmi_scores_zero() {
        let device = MediaDeviceInfo::output("hdmi-1", "HDMI Display Audio", "g2");
        let raw = score_label(&device.label).score
            + NON_DEFAULT_ID_BONUS
            + GROUP_ID_BONUS
            + LABEL_PRESENT_BONUS;
        assert!(raw < 0.0);

        let (confidence, device_type) = score_device(&device);
        assert_eq!(confidence, 0.0);
        assert_eq!(device_type, DeviceType::None);
    }

    #[tokio::test]
    async fn test_hdmi_only_is_not_connected() {
        let probe = probe_for(vec![MediaDeviceInfo::output("hdmi-1", "HDMI Display Audio", "g2")]);
        let status = probe.probe().await.unwrap();
        assert!(!status.is_connected);
        assert_eq!(status.confidence, 0.0);
    }

    #[test]
    fn test_unlabelled_device_penalized() {
        let (confidence, _) = score_device(&MediaDeviceInfo::output("abc", "", ""));
        assert!((confidence - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_default_device_penalized() {
        let (default_conf, _) = score_device(&MediaDeviceInfo::output("default", "Default - USB Audio", "g"));
        let (direct_conf, _) = score_device(&MediaDeviceInfo::output("usb-1", "USB Audio", "g"));
        assert!(default_conf < direct_conf);
    }

    #[tokio::test]
    async fn test_inputs_are_ignored() {
        let probe = probe_for(vec![MediaDeviceInfo {
            device_id: "mic".into(),
            label: "Headset Microphone".into(),
            group_id: "g".into(),
            kind: MediaDeviceKind::AudioInput,
        }]);
        assert!(matches!(probe.probe().await, Err(DetectionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_permission_denied_surfaces() {
        let devices = Arc::new(FixedDevices { devices: Mutex::new(vec![]), deny: true });
        let probe = EnumerateDevicesProbe::new(Some(devices), Duration::from_secs(5));
        assert!(matches!(probe.probe().await, Err(DetectionError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn test_missing_capability() {
        let probe = EnumerateDevicesProbe::new(None, Duration::from_secs(5));
        assert!(matches!(
            probe.probe().await,
            Err(DetectionError::CapabilityUnavailable(_))
        ));
    }
}
