//! Check and phase descriptors.
//!
//! A [`Check`] is a stateless description of one verification: which phase
//! it belongs to, how long a probe attempt may take, how often to retry,
//! and how to classify the gathered evidence into issues. A [`Phase`] is an
//! ordered group of checks; phases execute strictly by `order` because
//! later phases may assume earlier evidence exists.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::evidence::Evidence;
use crate::issue::Issue;

/// Identifier of a check, unique within a validation plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CheckId(pub String);

impl From<&str> for CheckId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for CheckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a phase, unique within a validation plan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhaseId(pub String);

impl From<&str> for PhaseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for PhaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Retry behavior for transient probe failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total probe attempts, including the first. Must be at least 1.
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles on every further attempt.
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Backoff delay to sleep after the given failed attempt (1-based).
    /// Capped at 30 seconds.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        const CAP_MS: u64 = 30_000;
        let shift = attempt.saturating_sub(1).min(16);
        let ms = self
            .backoff_ms
            .saturating_mul(1u64 << shift)
            .min(CAP_MS);
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 250,
        }
    }
}

/// Maps the full evidence slice gathered for a check to zero or more issues.
pub type Classifier = Arc<dyn Fn(&[Evidence]) -> Vec<Issue> + Send + Sync>;

/// A single unit of verification.
///
/// Checks are descriptors: registered once when the plan is built and
/// never mutated during a run. The classifier must be a pure function of
/// the evidence slice so that identical evidence always yields identical
/// issues.
#[derive(Clone)]
pub struct Check {
    /// Unique check identifier.
    pub id: CheckId,

    /// Human-readable name.
    pub name: String,

    /// Phase this check belongs to; must match the enclosing phase.
    pub phase_id: PhaseId,

    /// Upper bound for a single probe attempt, in milliseconds.
    pub timeout_ms: u64,

    /// Retry policy for transient probe failures.
    pub retry: RetryPolicy,

    /// Severity classification over the final evidence slice.
    pub classify: Classifier,
}

impl Check {
    /// Create a check with default timeout (10s), default retry policy and
    /// a classifier that emits no issues.
    pub fn new(id: impl Into<String>, name: impl Into<String>, phase_id: impl Into<String>) -> Self {
        Self {
            id: CheckId(id.into()),
            name: name.into(),
            phase_id: PhaseId(phase_id.into()),
            timeout_ms: 10_000,
            retry: RetryPolicy::default(),
            classify: Arc::new(|_| Vec::new()),
        }
    }

    /// Set the per-attempt timeout.
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the evidence classifier.
    pub fn classifier(
        mut self,
        f: impl Fn(&[Evidence]) -> Vec<Issue> + Send + Sync + 'static,
    ) -> Self {
        self.classify = Arc::new(f);
        self
    }
}

impl std::fmt::Debug for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Check")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("phase_id", &self.phase_id)
            .field("timeout_ms", &self.timeout_ms)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// An ordered, named group of checks.
#[derive(Debug, Clone)]
pub struct Phase {
    /// Unique phase identifier.
    pub id: PhaseId,

    /// Human-readable name.
    pub name: String,

    /// Execution position; unique and totally ordered across the plan.
    pub order: u32,

    /// Checks executed concurrently within this phase.
    pub checks: Vec<Check>,

    /// Critical-issue threshold that halts normal execution of later
    /// phases. `None` falls back to the engine default of 1.
    pub halt_on_critical_count: Option<u32>,
}

impl Phase {
    /// Create an empty phase.
    pub fn new(id: impl Into<String>, name: impl Into<String>, order: u32) -> Self {
        Self {
            id: PhaseId(id.into()),
            name: name.into(),
            order,
            checks: Vec::new(),
            halt_on_critical_count: None,
        }
    }

    /// Append a check to this phase.
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Set the critical-issue halt threshold.
    pub fn halt_on_criticals(mut self, count: u32) -> Self {
        self.halt_on_critical_count = Some(count);
        self
    }
}
