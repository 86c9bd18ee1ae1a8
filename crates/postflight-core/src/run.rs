//! Validation run aggregate and per-phase/per-check results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::check::{CheckId, PhaseId};
use crate::config::{Platform, ValidationDepth};
use crate::evidence::Evidence;
use crate::issue::{Issue, Severity};
use crate::verdict::Verdict;

/// Unique identifier for a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a fresh run identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The deployed system being validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Deployment name, namespace/app identifier or base URL.
    pub name: String,

    /// Platform the target runs on; selects the probe adapter.
    pub platform: Platform,
}

/// Terminal state of a single check execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The check ran to completion (its probe may still have failed and
    /// produced a synthetic issue).
    Completed,

    /// A fatal adapter error prevented the check from executing.
    Errored,

    /// The check was abandoned due to run cancellation.
    Cancelled,
}

/// Outcome of one check execution. Exactly one per executor invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// The executed check.
    pub check_id: CheckId,

    /// Phase the check ran in.
    pub phase_id: PhaseId,

    /// Terminal status.
    pub status: CheckStatus,

    /// Number of probe attempts made.
    pub attempts: u32,

    /// Evidence gathered by the probe adapter.
    pub evidence: Vec<Evidence>,

    /// Issues from the classifier plus any synthetic executor issues.
    pub issues: Vec<Issue>,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Terminal state of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// All checks finished and were classified.
    Complete,

    /// All checks finished, but classification was suppressed because an
    /// earlier phase already tripped its critical threshold.
    EvidenceOnly,

    /// The phase was interrupted before every check finished.
    Incomplete,

    /// The phase never started.
    Skipped,
}

/// Results of one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    /// The executed phase.
    pub phase_id: PhaseId,

    /// The phase's position in the plan.
    pub order: u32,

    /// Terminal status.
    pub status: PhaseStatus,

    /// Per-check outcomes, in plan order.
    pub check_results: Vec<CheckResult>,
}

impl PhaseResult {
    /// Number of issues at the given severity across all checks.
    pub fn count_severity(&self, severity: Severity) -> usize {
        self.check_results
            .iter()
            .flat_map(|c| c.issues.iter())
            .filter(|i| i.severity == severity)
            .count()
    }

    /// Whether this phase counts toward run completeness.
    pub fn ran_to_completion(&self) -> bool {
        matches!(self.status, PhaseStatus::Complete | PhaseStatus::EvidenceOnly)
    }
}

/// Whether every phase of a run executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunCompleteness {
    Complete,
    Incomplete,
}

/// Aggregate root for one validation execution.
///
/// Created when the orchestrator starts, mutated only by the orchestrator
/// while the run is live, and immutable once `verdict` is set. The
/// serialized form of this struct is the hand-off contract for external
/// report renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRun {
    /// Unique run identifier.
    pub run_id: RunId,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run finished; `None` while live.
    pub finished_at: Option<DateTime<Utc>>,

    /// The validated target.
    pub target: TargetDescriptor,

    /// Validation depth the plan was built for.
    pub depth: ValidationDepth,

    /// Per-phase results, ordered by phase `order`.
    pub phase_results: Vec<PhaseResult>,

    /// Deduplicated, severity-sorted issues from all phases.
    pub aggregated_issues: Vec<Issue>,

    /// Final verdict; `None` until all phases completed or the run was
    /// aborted.
    pub verdict: Option<Verdict>,
}

impl ValidationRun {
    /// Start a new run against the given target.
    pub fn start(target: TargetDescriptor, depth: ValidationDepth) -> Self {
        Self {
            run_id: RunId::new(),
            started_at: Utc::now(),
            finished_at: None,
            target,
            depth,
            phase_results: Vec::new(),
            aggregated_issues: Vec::new(),
            verdict: None,
        }
    }

    /// Derive completeness from the recorded phase results.
    ///
    /// A run with no recorded phases is incomplete by definition; the
    /// verdict engine must never see an empty run as passing.
    pub fn completeness(&self) -> RunCompleteness {
        if !self.phase_results.is_empty()
            && self.phase_results.iter().all(|p| p.ran_to_completion())
        {
            RunCompleteness::Complete
        } else {
            RunCompleteness::Incomplete
        }
    }

    /// Finalize the run: record the verdict and stamp the finish time.
    /// The run must be treated as immutable afterwards.
    pub fn finish(&mut self, verdict: Verdict) {
        self.finished_at = Some(Utc::now());
        self.verdict = Some(verdict);
    }

    /// Total wall-clock duration in milliseconds, if the run finished.
    pub fn duration_ms(&self) -> Option<u64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
    }
}
