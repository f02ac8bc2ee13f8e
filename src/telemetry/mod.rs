// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Telemetry buffer and rolled-up detection metrics
//!
//! Events accumulate in memory until the buffer reaches the batch size, at
//! which point the caller receives a [`PerformanceReport`] and the buffer is
//! cleared. Metrics live for the whole session and are only ever read as
//! snapshots.

use std::collections::BTreeMap;
use std::time::Duration;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TelemetryConfig;
use crate::detection::{DeviceStatus, ProbeOutcome};

/// One structured diagnostic record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    pub session_id: Uuid,
}

/// Per-probe counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_latency_ms: f64,
    pub last_latency_ms: f64,
    pub last_error: Option<String>,
}

impl ProbeStats {
    pub fn average_latency_ms(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.total_latency_ms / self.attempts as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// End-to-end latency of the most recent detection pass
    pub detection_latency: f64,
    /// Confidence of the most recently adopted result
    pub accuracy_score: f64,
    /// Distinct devices adopted this session
    pub device_count: usize,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub detections: u64,
    pub probe_stats: BTreeMap<String, ProbeStats>,
}

/// Payload of a `performanceMetrics` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub session_id: Uuid,
    pub metrics: Metrics,
    pub events: Vec<TelemetryEvent>,
    pub flushed_at: DateTime<Utc>,
}

struct Inner {
    buffer: Vec<TelemetryEvent>,
    metrics: Metrics,
}

pub struct Telemetry {
    session_id: Uuid,
    batch_size: usize,
    inner: Mutex<Inner>,
}

impl Telemetry {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            batch_size: config.batch_size.max(1),
            inner: Mutex::new(Inner {
                buffer: Vec::with_capacity(config.batch_size),
                metrics: Metrics::default(),
            }),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Append an event. Returns the flushed report when this event filled the batch.
    pub fn log_event(&self, name: &str, data: serde_json::Value) -> Option<PerformanceReport> {
        let mut inner = self.inner.lock();
        inner.buffer.push(TelemetryEvent {
            name: name.to_string(),
            timestamp: Utc::now(),
            data,
            session_id: self.session_id,
        });

        if inner.buffer.len() >= self.batch_size {
            Some(self.drain(&mut inner))
        } else {
            None
        }
    }

    /// Flush whatever is buffered, even if empty
    pub fn flush(&self) -> PerformanceReport {
        let mut inner = self.inner.lock();
        self.drain(&mut inner)
    }

    fn drain(&self, inner: &mut Inner) -> PerformanceReport {
        PerformanceReport {
            session_id: self.session_id,
            metrics: inner.metrics.clone(),
            events: std::mem::take(&mut inner.buffer),
            flushed_at: Utc::now(),
        }
    }

    /// Unflushed events; the buffer is left intact
    pub fn export(&self) -> Vec<TelemetryEvent> {
        self.inner.lock().buffer.clone()
    }

    pub fn buffered_len(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    pub fn metrics(&self) -> Metrics {
        self.inner.lock().metrics.clone()
    }

    pub fn record_probe(&self, outcome: &ProbeOutcome) {
        let latency_ms = outcome.latency_ms();
        let mut inner = self.inner.lock();
        let stats = inner
            .metrics
            .probe_stats
            .entry(outcome.probe.to_string())
            .or_default();

        stats.attempts += 1;
        stats.total_latency_ms += latency_ms;
        stats.last_latency_ms = latency_ms;
        match &outcome.result {
            Ok(_) => stats.successes += 1,
            Err(e) => {
                stats.failures += 1;
                stats.last_error = Some(e.to_string());
            }
        }
    }

    pub fn record_adoption(&self, status: &DeviceStatus, latency: Duration, device_count: usize) {
        let mut inner = self.inner.lock();
        let metrics = &mut inner.metrics;
        metrics.detection_latency = latency.as_secs_f64() * 1000.0;
        metrics.accuracy_score = status.confidence;
        metrics.device_count = device_count;
        metrics.detections += 1;
    }

    pub fn record_failure(&self, message: &str, latency: Duration) {
        let mut inner = self.inner.lock();
        let metrics = &mut inner.metrics;
        metrics.detection_latency = latency.as_secs_f64() * 1000.0;
        metrics.error_count += 1;
        metrics.last_error = Some(message.to_string());
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(&TelemetryConfig::default())
    }
}
