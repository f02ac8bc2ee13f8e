// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Configuration module

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Log level
    pub log_level: String,

    /// Use the simulated platform instead of real capabilities
    pub demo_mode: bool,

    /// Orchestrator configuration
    pub detection: DetectionConfig,

    /// Per-probe configuration
    pub probes: ProbeConfig,

    /// Telemetry configuration
    pub telemetry: TelemetryConfig,

    /// Consumer adapter configuration
    pub hook: HookConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "HeadSense".to_string(),
            log_level: "info".to_string(),
            demo_mode: true,
            detection: DetectionConfig::default(),
            probes: ProbeConfig::default(),
            telemetry: TelemetryConfig::default(),
            hook: HookConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Reject values the detector cannot run with
    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        for (name, value) in [
            ("detection.accuracy_threshold", d.accuracy_threshold),
            ("detection.min_adopt_confidence", d.min_adopt_confidence),
            ("hook.high_confidence_threshold", self.hook.high_confidence_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be within [0, 1], got {}", name, value);
            }
        }
        if d.circuit_breaker_threshold == 0 {
            bail!("detection.circuit_breaker_threshold must be at least 1");
        }
        if d.retry_multiplier < 1.0 {
            bail!("detection.retry_multiplier must be >= 1.0, got {}", d.retry_multiplier);
        }
        if self.telemetry.batch_size == 0 {
            bail!("telemetry.batch_size must be at least 1");
        }
        Ok(())
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("headsense"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// How long an adopted result stays valid
    pub cache_expiration_ms: u64,

    /// A successful probe at or above this confidence ends the chain early
    pub accuracy_threshold: f64,

    /// The best result must exceed this to be adopted
    pub min_adopt_confidence: f64,

    /// Consecutive failed passes before the breaker opens
    pub circuit_breaker_threshold: u32,

    /// Base of the exponential backoff
    pub retry_multiplier: f64,

    /// Backoff unit, scaled by `retry_multiplier ^ failure_count`
    pub backoff_base_ms: u64,

    /// Quiet period after a device-change notification before re-detecting
    pub device_change_debounce_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cache_expiration_ms: 30_000,
            accuracy_threshold: 0.95,
            min_adopt_confidence: 0.5,
            circuit_breaker_threshold: 5,
            retry_multiplier: 2.0,
            backoff_base_ms: 10_000,
            device_change_debounce_ms: 150,
        }
    }
}

impl DetectionConfig {
    pub fn cache_expiration(&self) -> Duration {
        Duration::from_millis(self.cache_expiration_ms)
    }

    pub fn device_change_debounce(&self) -> Duration {
        Duration::from_millis(self.device_change_debounce_ms)
    }
}

/// Per-probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub enumerate_timeout_ms: u64,
    pub bluetooth_timeout_ms: u64,
    pub audio_context_timeout_ms: u64,
    pub media_query_timeout_ms: u64,
    pub navigator_timeout_ms: u64,

    /// Delay between starting the probe tone and sampling the analyser
    pub audio_settle_ms: u64,

    /// Gain applied to the probe oscillator (near silent)
    pub probe_gain: f32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enumerate_timeout_ms: 5000,
            bluetooth_timeout_ms: 3000,
            audio_context_timeout_ms: 5000,
            media_query_timeout_ms: 1000,
            navigator_timeout_ms: 500,
            audio_settle_ms: 50,
            probe_gain: 0.001,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Buffered events that trigger an automatic flush
    pub batch_size: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

/// Consumer adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Run a detection as soon as the hook mounts
    pub auto_start: bool,

    /// Coalescing window for incoming status changes
    pub debounce_ms: u64,

    /// Retries after a failed detection before the error is surfaced
    pub max_retries: u32,

    /// Entries kept in the detection history
    pub history_limit: usize,

    /// Confidence at which `is_high_confidence` turns true
    pub high_confidence_threshold: f64,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            debounce_ms: 100,
            max_retries: 3,
            history_limit: 50,
            high_confidence_threshold: 0.85,
        }
    }
}
