// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! HeadSense - Headphone and Audio-Device Detection Engine
//!
//! Best-effort answer to "is the user listening through headphones?" built
//! from unreliable, permission-gated platform signals:
//! - Five confidence-scored probes run most-authoritative first
//! - Early exit on a conclusive probe, best-result adoption otherwise
//! - Result cache, circuit breaker with exponential backoff
//! - Telemetry buffer with batched flushes and per-probe stats
//! - Debounced consumer hook with retry and rolling history
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       HeadSense Engine                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │ Platform │ → │ Probe chain  │ → │ Detector (cache,     │  │
//! │  │ traits   │   │ (5 probes)   │   │ breaker, telemetry)  │  │
//! │  └──────────┘   └──────────────┘   └──────────────────────┘  │
//! │                                              ↓               │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                       Event Bus                        │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                                              ↓               │
//! │                                    ┌──────────────────────┐  │
//! │                                    │    Binding Hook      │  │
//! │                                    └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod core;
pub mod config;
pub mod error;
pub mod platform;
pub mod probes;
pub mod detection;
pub mod telemetry;
pub mod hook;

// Re-exports for convenience
pub use config::Config;
pub use crate::core::{DetectorEvent, Engine, EventBus, EventType};
pub use detection::{
    select_backend, DetectionBackend, DeviceStatus, DeviceType, HeadphoneDetector,
};
pub use error::DetectionError;
pub use hook::{HeadphoneHook, HookSnapshot};
pub use platform::{Platform, PlatformKind};

/// HeadSense version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// HeadSense name
pub const NAME: &str = "HeadSense";

/// Build info
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION.to_string(),
        target: std::env::consts::ARCH.to_string(),
        os: std::env::consts::OS.to_string(),
        features: enabled_features(),
    }
}

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: String,
    pub target: String,
    pub os: String,
    pub features: Vec<String>,
}

fn enabled_features() -> Vec<String> {
    let mut features = vec![];

    #[cfg(feature = "simulator")]
    features.push("simulator".to_string());

    features
}
