// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Simulated platform for demo/testing

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::prelude::*;
use tokio::sync::broadcast;
use tracing::debug;

use super::{
    AudioBackend, AudioGraph, AudioOutputInfo, AudioRoute, AudioRouteInfo, Bluetooth,
    BluetoothDevice, Environment, MediaDeviceInfo, MediaDeviceKind, MediaDevices, Platform,
    PlatformKind, RoutePort,
};
use crate::error::DetectionError;

struct SimState {
    devices: Vec<MediaDeviceInfo>,
    permission_granted: bool,
    labels_unlocked: bool,
    enumerate_delay: Duration,

    bluetooth_adapter: bool,
    bound_bluetooth: Option<BluetoothDevice>,
    nearby_bluetooth: Option<BluetoothDevice>,

    audio_output: AudioOutputInfo,
    tone_audible: bool,

    user_agent: String,
    platform: String,
    cores: Option<u32>,
    memory_gb: Option<f64>,
    connection: Option<String>,
    media_features: HashMap<String, bool>,

    route: AudioRouteInfo,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            devices: vec![
                MediaDeviceInfo::output("default", "Default - MacBook Pro Speakers", "grp-internal"),
                MediaDeviceInfo::output("spk-01", "MacBook Pro Speakers", "grp-internal"),
                MediaDeviceInfo {
                    device_id: "mic-01".to_string(),
                    label: "MacBook Pro Microphone".to_string(),
                    group_id: "grp-internal".to_string(),
                    kind: MediaDeviceKind::AudioInput,
                },
            ],
            permission_granted: true,
            labels_unlocked: false,
            enumerate_delay: Duration::from_millis(5),
            bluetooth_adapter: true,
            bound_bluetooth: None,
            nearby_bluetooth: None,
            audio_output: AudioOutputInfo {
                sample_rate: 48000.0,
                max_channel_count: 2,
                output_latency: Some(0.02),
            },
            tone_audible: true,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15".to_string(),
            platform: "MacIntel".to_string(),
            cores: Some(8),
            memory_gb: Some(8.0),
            connection: Some("4g".to_string()),
            media_features: HashMap::new(),
            route: AudioRouteInfo {
                port: RoutePort::Speaker,
                name: "Speaker".to_string(),
            },
        }
    }
}

/// Scriptable stand-in for every platform capability
pub struct SimulatedPlatform {
    state: Mutex<SimState>,
    changes: broadcast::Sender<()>,
    enumerate_calls: AtomicUsize,
    bluetooth_queries: AtomicUsize,
    graphs_created: AtomicUsize,
    tones_playing: Arc<AtomicUsize>,
}

impl SimulatedPlatform {
    /// A laptop with only its built-in speakers
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            state: Mutex::new(SimState::default()),
            changes,
            enumerate_calls: AtomicUsize::new(0),
            bluetooth_queries: AtomicUsize::new(0),
            graphs_created: AtomicUsize::new(0),
            tones_playing: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Laptop with wired headphones plugged in
    pub fn with_wired_headphones() -> Arc<Self> {
        let sim = Self::new();
        sim.plug_in(MediaDeviceInfo::output("hp-wired", "External Headphones", "grp-jack"));
        sim
    }

    /// Laptop paired with Bluetooth headphones
    pub fn with_bluetooth_headphones(name: &str) -> Arc<Self> {
        let sim = Self::new();
        sim.plug_in(MediaDeviceInfo::output("bt-01", name, "grp-bt"));
        sim.set_bound_bluetooth(Some(BluetoothDevice {
            id: "bt-01".to_string(),
            name: Some(name.to_string()),
            connected: true,
        }));
        sim
    }

    /// Capabilities for `kind`, all backed by this simulator
    pub fn platform(self: &Arc<Self>, kind: PlatformKind) -> Platform {
        match kind {
            PlatformKind::Web => Platform::web()
                .with_media_devices(self.clone())
                .with_bluetooth(self.clone())
                .with_audio(self.clone())
                .with_environment(self.clone()),
            PlatformKind::Native => Platform::native(self.clone()),
            PlatformKind::Unsupported => Platform::unsupported(),
        }
    }

    pub fn plug_in(&self, device: MediaDeviceInfo) {
        debug!("Simulated device plugged in: {}", device.label);
        self.state.lock().devices.push(device);
        self.notify_change();
    }

    pub fn unplug(&self, device_id: &str) {
        self.state.lock().devices.retain(|d| d.device_id != device_id);
        self.notify_change();
    }

    pub fn set_devices(&self, devices: Vec<MediaDeviceInfo>) {
        self.state.lock().devices = devices;
        self.notify_change();
    }

    pub fn set_permission_granted(&self, granted: bool) {
        let mut state = self.state.lock();
        state.permission_granted = granted;
        if !granted {
            state.labels_unlocked = false;
        }
    }

    pub fn set_enumerate_delay(&self, delay: Duration) {
        self.state.lock().enumerate_delay = delay;
    }

    pub fn set_bluetooth_adapter(&self, present: bool) {
        self.state.lock().bluetooth_adapter = present;
    }

    pub fn set_bound_bluetooth(&self, device: Option<BluetoothDevice>) {
        self.state.lock().bound_bluetooth = device;
    }

    pub fn set_nearby_bluetooth(&self, device: Option<BluetoothDevice>) {
        self.state.lock().nearby_bluetooth = device;
    }

    pub fn set_audio_output(&self, info: AudioOutputInfo, audible: bool) {
        let mut state = self.state.lock();
        state.audio_output = info;
        state.tone_audible = audible;
    }

    pub fn set_user_agent(&self, user_agent: &str, platform: &str) {
        let mut state = self.state.lock();
        state.user_agent = user_agent.to_string();
        state.platform = platform.to_string();
    }

    pub fn set_hardware(&self, cores: Option<u32>, memory_gb: Option<f64>, connection: Option<&str>) {
        let mut state = self.state.lock();
        state.cores = cores;
        state.memory_gb = memory_gb;
        state.connection = connection.map(str::to_string);
    }

    pub fn set_media_feature(&self, query: &str, matches: bool) {
        self.state.lock().media_features.insert(query.to_string(), matches);
    }

    pub fn set_route(&self, port: RoutePort, name: &str) {
        self.state.lock().route = AudioRouteInfo { port, name: name.to_string() };
        self.notify_change();
    }

    pub fn notify_change(&self) {
        let _ = self.changes.send(());
    }

    pub fn enumerate_calls(&self) -> usize {
        self.enumerate_calls.load(Ordering::SeqCst)
    }

    pub fn bluetooth_queries(&self) -> usize {
        self.bluetooth_queries.load(Ordering::SeqCst)
    }

    pub fn graphs_created(&self) -> usize {
        self.graphs_created.load(Ordering::SeqCst)
    }

    /// Graphs currently sounding a probe tone
    pub fn tones_playing(&self) -> usize {
        self.tones_playing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevices for SimulatedPlatform {
    async fn unlock_labels(&self) -> Result<(), DetectionError> {
        let mut state = self.state.lock();
        if !state.permission_granted {
            return Err(DetectionError::PermissionDenied("microphone access refused".to_string()));
        }
        state.labels_unlocked = true;
        Ok(())
    }

    async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>, DetectionError> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.lock().enumerate_delay;
        tokio::time::sleep(delay).await;

        let state = self.state.lock();
        Ok(state
            .devices
            .iter()
            .map(|d| {
                let mut d = d.clone();
                if !state.labels_unlocked {
                    d.label.clear();
                }
                d
            })
            .collect())
    }

    fn device_changes(&self) -> Option<broadcast::Receiver<()>> {
        Some(self.changes.subscribe())
    }
}

#[async_trait]
impl Bluetooth for SimulatedPlatform {
    fn bound_device(&self) -> Option<BluetoothDevice> {
        self.state.lock().bound_bluetooth.clone()
    }

    async fn is_available(&self) -> Result<bool, DetectionError> {
        Ok(self.state.lock().bluetooth_adapter)
    }

    async fn find_audio_device(&self) -> Result<Option<BluetoothDevice>, DetectionError> {
        self.bluetooth_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().nearby_bluetooth.clone())
    }
}

struct SimulatedGraph {
    info: AudioOutputInfo,
    audible: bool,
    tone_gain: Option<f32>,
    tones_playing: Arc<AtomicUsize>,
    rng: rand::rngs::StdRng,
}

impl AudioGraph for SimulatedGraph {
    fn output_info(&self) -> AudioOutputInfo {
        self.info
    }

    fn start_probe_tone(&mut self, gain: f32) -> Result<(), DetectionError> {
        if self.tone_gain.replace(gain).is_none() {
            self.tones_playing.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn frequency_data(&mut self) -> Vec<u8> {
        let mut bins = vec![0u8; 64];
        if self.audible && self.tone_gain.is_some() {
            // A faint peak around the oscillator bin with some leakage
            let peak = self.rng.gen_range(8..16);
            for (offset, bin) in bins.iter_mut().skip(peak - 2).take(5).enumerate() {
                *bin = self.rng.gen_range(1..4) + if offset == 2 { 2 } else { 0 };
            }
        }
        bins
    }

    fn stop_probe_tone(&mut self) {
        if self.tone_gain.take().is_some() {
            self.tones_playing.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        false
    }
}

#[async_trait]
impl AudioBackend for SimulatedPlatform {
    async fn create_graph(&self) -> Result<Box<dyn AudioGraph>, DetectionError> {
        self.graphs_created.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock();
        Ok(Box::new(SimulatedGraph {
            info: state.audio_output,
            audible: state.tone_audible,
            tone_gain: None,
            tones_playing: Arc::clone(&self.tones_playing),
            rng: rand::rngs::StdRng::from_entropy(),
        }))
    }
}

impl Environment for SimulatedPlatform {
    fn user_agent(&self) -> String {
        self.state.lock().user_agent.clone()
    }

    fn platform(&self) -> String {
        self.state.lock().platform.clone()
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        self.state.lock().cores
    }

    fn device_memory_gb(&self) -> Option<f64> {
        self.state.lock().memory_gb
    }

    fn effective_connection_type(&self) -> Option<String> {
        self.state.lock().connection.clone()
    }

    fn matches_media(&self, query: &str) -> Option<bool> {
        Some(self.state.lock().media_features.get(query).copied().unwrap_or(false))
    }
}

#[async_trait]
impl AudioRoute for SimulatedPlatform {
    async fn current_route(&self) -> Result<AudioRouteInfo, DetectionError> {
        Ok(self.state.lock().route.clone())
    }

    fn route_changes(&self) -> Option<broadcast::Receiver<()>> {
        Some(self.changes.subscribe())
    }
}
