// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Platform capabilities consumed by the probes
//!
//! Every platform API is an opaque collaborator behind a narrow trait. A
//! capability that does not exist on the running platform is `None` in
//! [`Platform`], which the probes report as `CapabilityUnavailable`.

#[cfg(feature = "simulator")]
mod simulated;

#[cfg(feature = "simulator")]
pub use simulated::SimulatedPlatform;

use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::DetectionError;

/// Which implementation family the platform supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Browser-style capabilities: media devices, Bluetooth, audio graph
    Web,
    /// An OS audio-route API reports the active output directly
    Native,
    /// Nothing usable
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaDeviceKind {
    AudioInput,
    AudioOutput,
    VideoInput,
}

/// One entry of a media-device enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    /// Empty until a media permission has been granted
    pub label: String,
    pub group_id: String,
    pub kind: MediaDeviceKind,
}

impl MediaDeviceInfo {
    pub fn output(device_id: &str, label: &str, group_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            label: label.to_string(),
            group_id: group_id.to_string(),
            kind: MediaDeviceKind::AudioOutput,
        }
    }
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire an audio capture handle and release it immediately, only to unlock labels
    async fn unlock_labels(&self) -> Result<(), DetectionError>;

    async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, DetectionError>;

    /// Push notification fired whenever the device list changes
    fn device_changes(&self) -> Option<broadcast::Receiver<()>> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BluetoothDevice {
    pub id: String,
    pub name: Option<String>,
    pub connected: bool,
}

#[async_trait]
pub trait Bluetooth: Send + Sync {
    /// Device bound by an earlier request, if the platform kept it
    fn bound_device(&self) -> Option<BluetoothDevice>;

    /// Whether a Bluetooth adapter is present and enabled
    async fn is_available(&self) -> Result<bool, DetectionError>;

    /// Look for an audio-capable device
    async fn find_audio_device(&self) -> Result<Option<BluetoothDevice>, DetectionError>;
}

/// Properties of the audio graph's output node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioOutputInfo {
    pub sample_rate: f32,
    pub max_channel_count: u32,
    /// Seconds; `None` where the platform does not report it
    pub output_latency: Option<f64>,
}

/// A live oscillator -> analyser -> gain -> destination graph
pub trait AudioGraph: Send {
    fn output_info(&self) -> AudioOutputInfo;

    /// Start a tone at `gain` routed through the analyser into the output
    fn start_probe_tone(&mut self, gain: f32) -> Result<(), DetectionError>;

    /// Frequency-domain bins from the analyser
    fn frequency_data(&mut self) -> Vec<u8>;

    fn stop_probe_tone(&mut self);

    /// A closed graph must be rebuilt before reuse
    fn is_closed(&self) -> bool;
}

#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn create_graph(&self) -> Result<Box<dyn AudioGraph>, DetectionError>;
}

/// Platform and environment descriptors
pub trait Environment: Send + Sync {
    fn user_agent(&self) -> String;
    fn platform(&self) -> String;
    fn hardware_concurrency(&self) -> Option<u32>;
    fn device_memory_gb(&self) -> Option<f64>;
    /// e.g. "4g", "3g"
    fn effective_connection_type(&self) -> Option<String>;
    /// `None` when media-feature queries cannot be evaluated at all
    fn matches_media(&self, query: &str) -> Option<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePort {
    Wired,
    Bluetooth,
    Speaker,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRouteInfo {
    pub port: RoutePort,
    pub name: String,
}

/// OS-level audio route reporting (native platforms)
#[async_trait]
pub trait AudioRoute: Send + Sync {
    async fn current_route(&self) -> Result<AudioRouteInfo, DetectionError>;

    fn route_changes(&self) -> Option<broadcast::Receiver<()>> {
        None
    }
}

/// The set of capabilities available on the running platform
#[derive(Clone)]
pub struct Platform {
    pub kind: PlatformKind,
    pub media_devices: Option<Arc<dyn MediaDevices>>,
    pub bluetooth: Option<Arc<dyn Bluetooth>>,
    pub audio: Option<Arc<dyn AudioBackend>>,
    pub environment: Option<Arc<dyn Environment>>,
    pub audio_route: Option<Arc<dyn AudioRoute>>,
}

impl Platform {
    pub fn unsupported() -> Self {
        Self {
            kind: PlatformKind::Unsupported,
            media_devices: None,
            bluetooth: None,
            audio: None,
            environment: None,
            audio_route: None,
        }
    }

    pub fn web() -> Self {
        Self { kind: PlatformKind::Web, ..Self::unsupported() }
    }

    pub fn native(route: Arc<dyn AudioRoute>) -> Self {
        Self {
            kind: PlatformKind::Native,
            audio_route: Some(route),
            ..Self::unsupported()
        }
    }

    pub fn with_media_devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
        self.media_devices = Some(devices);
        self
    }

    pub fn with_bluetooth(mut self, bluetooth: Arc<dyn Bluetooth>) -> Self {
        self.bluetooth = Some(bluetooth);
        self
    }

    pub fn with_audio(mut self, audio: Arc<dyn AudioBackend>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Device-change stream for whichever capability provides one
    pub fn device_changes(&self) -> Option<broadcast::Receiver<()>> {
        match self.kind {
            PlatformKind::Web => self.media_devices.as_ref().and_then(|m| m.device_changes()),
            PlatformKind::Native => self.audio_route.as_ref().and_then(|r| r.route_changes()),
            PlatformKind::Unsupported => None,
        }
    }

    /// Names of the capabilities present, for logs
    pub fn capabilities(&self) -> Vec<&'static str> {
        let mut caps = Vec::new();
        if self.media_devices.is_some() {
            caps.push("media-devices");
        }
        if self.bluetooth.is_some() {
            caps.push("bluetooth");
        }
        if self.audio.is_some() {
            caps.push("audio-graph");
        }
        if self.environment.is_some() {
            caps.push("environment");
        }
        if self.audio_route.is_some() {
            caps.push("audio-route");
        }
        caps
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}
