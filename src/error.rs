// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/headsense

//! Detection error taxonomy

use thiserror::Error;

/// Failure of a single probe or platform call.
///
/// Probe failures never escape the orchestrator: they are logged to
/// telemetry and count as "no vote" for that probe.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectionError {
    /// The platform API does not exist here. Skipped, never retried.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// The user or platform refused access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The probe did not settle before its deadline and was abandoned.
    #[error("probe '{probe}' timed out after {timeout_ms}ms")]
    Timeout { probe: String, timeout_ms: u64 },

    /// The platform answered but nothing usable was found.
    #[error("nothing found: {0}")]
    NotFound(String),

    /// Anything else that may succeed on a later attempt.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl DetectionError {
    /// Stable identifier used in telemetry payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionError::CapabilityUnavailable(_) => "capability_unavailable",
            DetectionError::PermissionDenied(_) => "permission_denied",
            DetectionError::Timeout { .. } => "timeout",
            DetectionError::NotFound(_) => "not_found",
            DetectionError::Transient(_) => "transient",
        }
    }

    /// Whether a later detection pass could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            DetectionError::CapabilityUnavailable(_) | DetectionError::PermissionDenied(_)
        )
    }

    pub fn unavailable(what: impl Into<String>) -> Self {
        DetectionError::CapabilityUnavailable(what.into())
    }

    pub fn transient(what: impl Into<String>) -> Self {
        DetectionError::Transient(what.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(!DetectionError::unavailable("bluetooth").is_retryable());
        assert!(!DetectionError::PermissionDenied("mic".into()).is_retryable());
        assert!(DetectionError::transient("enumerate failed").is_retryable());
        assert!(DetectionError::Timeout { probe: "x".into(), timeout_ms: 10 }.is_retryable());
    }

    #[test]
    fn test_display_includes_probe_name() {
        let err = DetectionError::Timeout { probe: "navigator-properties".into(), timeout_ms: 500 };
        assert_eq!(err.to_string(), "probe 'navigator-properties' timed out after 500ms");
        assert_eq!(err.kind(), "timeout");
    }
}
