// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Result cache for adopted statuses

use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::DeviceStatus;

#[derive(Debug, Clone)]
struct CachedResult {
    status: DeviceStatus,
    cached_at: Instant,
}

/// Snapshot returned by `cache_info()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub has_cached: bool,
    pub age_ms: Option<u64>,
    pub expires_in_ms: Option<u64>,
    pub is_valid: bool,
}

/// Single-slot cache, valid while `now - cached_at < expiration`
#[derive(Debug)]
pub struct ResultCache {
    entry: Option<CachedResult>,
    expiration: Duration,
}

impl ResultCache {
    pub fn new(expiration: Duration) -> Self {
        Self { entry: None, expiration }
    }

    pub fn store(&mut self, status: DeviceStatus, now: Instant) {
        self.entry = Some(CachedResult { status, cached_at: now });
    }

    pub fn get(&self, now: Instant) -> Option<&DeviceStatus> {
        self.entry
            .as_ref()
            .filter(|e| now.saturating_duration_since(e.cached_at) < self.expiration)
            .map(|e| &e.status)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn info(&self, now: Instant) -> CacheInfo {
        match &self.entry {
            Some(entry) => {
                let age = now.saturating_duration_since(entry.cached_at);
                CacheInfo {
                    has_cached: true,
                    age_ms: Some(age.as_millis() as u64),
                    expires_in_ms: Some(self.expiration.saturating_sub(age).as_millis() as u64),
                    is_valid: age < self.expiration,
                }
            }
            None => CacheInfo {
                has_cached: false,
                age_ms: None,
                expires_in_ms: None,
                is_valid: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DeviceType;

    #[test]
    fn test_expiry() {
        let mut cache = ResultCache::new(Duration::from_secs(30));
        let now = Instant::now();
        cache.store(DeviceStatus::new(true, DeviceType::Wired, "Headphones", 0.9), now);

        assert!(cache.get(now + Duration::from_secs(29)).is_some());
        assert!(cache.get(now + Duration::from_secs(30)).is_none());
    }

    #[test]
    fn test_info_and_invalidate() {
        let mut cache = ResultCache::new(Duration::from_secs(30));
        let now = Instant::now();
        assert!(!cache.info(now).has_cached);

        cache.store(DeviceStatus::empty(), now);
        let info = cache.info(now + Duration::from_secs(10));
        assert!(info.is_valid);
        assert_eq!(info.age_ms, Some(10_000));
        assert_eq!(info.expires_in_ms, Some(20_000));

        cache.invalidate();
        assert!(cache.get(now).is_none());
        assert!(!cache.info(now).has_cached);
    }
}
