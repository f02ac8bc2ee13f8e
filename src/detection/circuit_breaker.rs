// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Circuit breaker guarding the probe chain
//!
//! Closed until `threshold` failed passes accumulate, then open. An open
//! breaker blocks detection while
//! `now - last_failure_at < multiplier ^ failure_count * base`, recomputed
//! on every call. Once the window lapses a pass may run again, and only
//! successes close the breaker: each one decays `failure_count` by one and
//! the breaker closes when it reaches zero.

use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::DetectionConfig;

/// Breaker state visible to consumers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerState {
    pub failure_count: u32,
    /// Milliseconds since the most recent failure, if any
    pub since_last_failure_ms: Option<u64>,
    pub is_open: bool,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    failure_count: u32,
    last_failure_at: Option<Instant>,
    is_open: bool,
    threshold: u32,
    multiplier: f64,
    base: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, multiplier: f64, base: Duration) -> Self {
        Self {
            failure_count: 0,
            last_failure_at: None,
            is_open: false,
            threshold,
            multiplier,
            base,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(
            config.circuit_breaker_threshold,
            config.retry_multiplier,
            Duration::from_millis(config.backoff_base_ms),
        )
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Current backoff window for the accumulated failures
    pub fn backoff(&self) -> Duration {
        let factor = self.multiplier.powi(self.failure_count as i32);
        // Saturate instead of panicking on absurd exponents
        Duration::try_from_secs_f64(self.base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }

    /// Whether an open breaker is still inside its backoff window
    pub fn should_keep_open(&self, now: Instant) -> bool {
        if !self.is_open {
            return false;
        }
        match self.last_failure_at {
            Some(at) => now.saturating_duration_since(at) < self.backoff(),
            None => false,
        }
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_at = Some(now);
        if self.failure_count >= self.threshold {
            self.is_open = true;
        }
    }

    pub fn record_success(&mut self) {
        self.failure_count = self.failure_count.saturating_sub(1);
        if self.failure_count == 0 {
            self.is_open = false;
            self.last_failure_at = None;
        }
    }

    pub fn reset(&mut self) {
        self.failure_count = 0;
        self.last_failure_at = None;
        self.is_open = false;
    }

    pub fn state(&self, now: Instant) -> CircuitBreakerState {
        CircuitBreakerState {
            failure_count: self.failure_count,
            since_last_failure_ms: self
                .last_failure_at
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            is_open: self.is_open,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_at_threshold() {
        let mut breaker = CircuitBreaker::default();
        let now = Instant::now();
        for _ in 0..4 {
            breaker.record_failure(now);
        }
        assert!(!breaker.is_open());

        breaker.record_failure(now);
        assert!(breaker.is_open());
        assert!(breaker.should_keep_open(now));
    }

    #[test]
    fn test_backoff_is_exponential() {
        let mut breaker = CircuitBreaker::default();
        assert_eq!(breaker.backoff(), Duration::from_secs(10));
        let now = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(now);
        }
        assert_eq!(breaker.backoff(), Duration::from_secs(320));
    }

    #[test]
    fn test_window_elapses() {
        let mut breaker = CircuitBreaker::default();
        let start = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(start);
        }
        assert!(breaker.should_keep_open(start + Duration::from_secs(319)));
        assert!(!breaker.should_keep_open(start + Duration::from_secs(320)));
        // Window lapsing alone does not close it
        assert!(breaker.is_open());
    }

    #[test]
    fn test_successes_decay_and_close() {
        let mut breaker = CircuitBreaker::default();
        let now = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(now);
        }

        breaker.record_success();
        assert_eq!(breaker.failure_count(), 4);
        assert!(breaker.is_open());

        for _ in 0..4 {
            breaker.record_success();
        }
        assert_eq!(breaker.failure_count(), 0);
        assert!(!breaker.is_open());

        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_reset() {
        let mut breaker = CircuitBreaker::default();
        let now = Instant::now();
        for _ in 0..6 {
            breaker.record_failure(now);
        }
        breaker.reset();
        let state = breaker.state(now);
        assert_eq!(state.failure_count, 0);
        assert_eq!(state.since_last_failure_ms, None);
        assert!(!state.is_open);
    }
}
