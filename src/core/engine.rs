// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Main engine - owns the detection backend for the session

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use anyhow::Result;
use tracing::info;

use super::SystemState;
use crate::config::Config;
use crate::detection::{select_backend, DetectionBackend};
use crate::hook::{HeadphoneHook, StateSetter};
use crate::platform::Platform;

/// Composition root: one backend per session, started and stopped with the app
pub struct Engine {
    pub config: Arc<Config>,
    backend: Arc<dyn DetectionBackend>,
    state: Arc<RwLock<SystemState>>,
    start_time: Option<Instant>,
}

impl Engine {
    pub fn new(config: Config, platform: Platform) -> Result<Self> {
        config.validate()?;
        info!("Platform capabilities: {:?}", platform.capabilities());

        let backend = select_backend(platform, &config);
        let state = SystemState {
            backend: backend.name().to_string(),
            ..SystemState::default()
        };

        Ok(Self {
            config: Arc::new(config),
            backend,
            state: Arc::new(RwLock::new(state)),
            start_time: None,
        })
    }

    pub fn backend(&self) -> Arc<dyn DetectionBackend> {
        Arc::clone(&self.backend)
    }

    pub async fn start(&mut self) -> Result<()> {
        info!("Starting {} engine...", self.config.app_name);
        self.start_time = Some(Instant::now());

        let listening = self.backend.start_listening();
        {
            let mut state = self.state.write().await;
            state.running = true;
            state.listening = listening;
        }

        info!("{} engine started", self.config.app_name);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping {} engine...", self.config.app_name);
        self.backend.stop_listening();

        {
            let mut state = self.state.write().await;
            state.running = false;
            state.listening = false;
        }

        info!("{} engine stopped", self.config.app_name);
        Ok(())
    }

    /// Mount a binding hook on this engine's backend
    pub fn mount_hook(&self, setter: StateSetter) -> HeadphoneHook {
        HeadphoneHook::mount(self.backend(), self.config.hook.clone(), setter)
    }

    pub async fn state(&self) -> SystemState {
        let metrics = self.backend.metrics();
        let mut state = self.state.write().await;
        state.detections = metrics.detections;
        state.error_count = metrics.error_count;
        state.device_count = metrics.device_count;
        state.circuit_open = self.backend.is_circuit_breaker_open();
        state.events_emitted = self.backend.events().emitted_count();
        state.uptime_seconds = self.uptime();
        state.clone()
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }
}
