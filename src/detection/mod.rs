// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Detection module - probe orchestration, caching and circuit breaking

mod status;
mod cache;
mod circuit_breaker;
mod orchestrator;
mod backend;

pub use status::{clamp_confidence, DeviceStatus, DeviceType, ProbeOutcome};
pub use cache::{CacheInfo, ResultCache};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerState};
pub use orchestrator::{DetectionFailure, HeadphoneDetector, ProbeError};
pub use backend::{select_backend, DetectionBackend, NullBackend};
