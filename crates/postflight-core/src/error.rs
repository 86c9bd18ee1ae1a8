//! Error taxonomy for the validation engine.
//!
//! Check-level failures never cross component boundaries as errors: the
//! executor converts them into issues. The only hard failure out of a run
//! is [`ConfigError`], raised before any phase executes.

use crate::check::{CheckId, PhaseId};

/// Error returned by a probe adapter.
///
/// `Transient` failures are retried per the check's retry policy and
/// downgraded to a HIGH issue on exhaustion. `Fatal` failures abort only
/// the affected check and are recorded as a CRITICAL issue.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    #[error("transient probe failure: {reason}")]
    Transient { reason: String },

    #[error("fatal probe failure: {reason}")]
    Fatal { reason: String },
}

impl AdapterError {
    /// Build a transient (retryable) error.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    /// Build a fatal (non-retryable) error.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    /// Whether the executor may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Invalid run configuration or validation plan.
///
/// Fatal at orchestrator startup; surfaced to the caller before any phase
/// runs.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("validation plan has no phases")]
    EmptyPlan,

    #[error("phase '{phase}' has no checks")]
    EmptyPhase { phase: PhaseId },

    #[error("duplicate phase order {order} shared by '{first}' and '{second}'")]
    DuplicatePhaseOrder {
        order: u32,
        first: PhaseId,
        second: PhaseId,
    },

    #[error("duplicate phase id '{phase}'")]
    DuplicatePhaseId { phase: PhaseId },

    #[error("check '{check}' declares phase '{declared}' but is registered under '{actual}'")]
    CheckPhaseMismatch {
        check: CheckId,
        declared: PhaseId,
        actual: PhaseId,
    },

    #[error("duplicate check id '{check}'")]
    DuplicateCheckId { check: CheckId },

    #[error("check '{check}' has a retry policy with zero attempts")]
    ZeroAttempts { check: CheckId },

    #[error("phase override references unknown phase '{phase}'")]
    UnknownPhaseOverride { phase: PhaseId },

    #[error("no probe adapter registered for platform '{platform}'")]
    UnknownPlatform { platform: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_error_retryability() {
        assert!(AdapterError::transient("connection reset").is_retryable());
        assert!(!AdapterError::fatal("missing credentials").is_retryable());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::DuplicatePhaseOrder {
            order: 20,
            first: PhaseId::from("workload_status"),
            second: PhaseId::from("log_scan"),
        };
        assert!(err.to_string().contains("duplicate phase order 20"));

        let err = ConfigError::UnknownPlatform {
            platform: "mainframe".to_string(),
        };
        assert!(err.to_string().contains("mainframe"));
    }
}
