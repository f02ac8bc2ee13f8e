// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Core module - engine, event bus and task scheduling

mod engine;
mod scheduler;
mod event_bus;

pub use engine::Engine;
pub use scheduler::Scheduler;
pub use event_bus::{listener, DetectorEvent, EventBus, EventCallback, EventType, Subscription};

use serde::{Deserialize, Serialize};

/// Session-wide state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemState {
    pub running: bool,
    pub backend: String,
    pub listening: bool,
    pub detections: u64,
    pub error_count: u64,
    pub device_count: usize,
    pub circuit_open: bool,
    pub events_emitted: u64,
    pub uptime_seconds: u64,
}
