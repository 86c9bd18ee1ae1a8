//! Classified findings with severity and remediation context.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::check::CheckId;
use crate::evidence::{Evidence, EvidenceId};

/// Unique identifier for an issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IssueId(pub Uuid);

impl IssueId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IssueId {
    fn default() -> Self {
        Self::new()
    }
}

/// Issue severity, ordered most severe first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Sort rank; lower is more severe.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }

    /// Whether this severity blocks a PASS verdict.
    pub fn is_blocking(self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        f.write_str(s)
    }
}

/// A classified finding produced by a check's classifier (or synthesized
/// by the executor for probe failures and cancellation).
///
/// Issues are immutable and owned by the run that produced them. Evidence
/// is referenced by id for traceability, never embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Unique issue identifier.
    pub id: IssueId,

    /// The check that produced this finding.
    pub check_id: CheckId,

    /// Classified severity.
    pub severity: Severity,

    /// Human-readable description; also the deduplication key together
    /// with `check_id`.
    pub message: String,

    /// Evidence records backing this finding.
    pub evidence_refs: Vec<EvidenceId>,

    /// Suggested remediation, if the classifier knows one.
    pub remediation_hint: Option<String>,
}

impl Issue {
    /// Create an issue with no evidence references.
    pub fn new(check_id: CheckId, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: IssueId::new(),
            check_id,
            severity,
            message: message.into(),
            evidence_refs: Vec::new(),
            remediation_hint: None,
        }
    }

    /// Attach a remediation hint.
    pub fn with_remediation(mut self, hint: impl Into<String>) -> Self {
        self.remediation_hint = Some(hint.into());
        self
    }

    /// Reference a single evidence record.
    pub fn with_evidence_ref(mut self, id: EvidenceId) -> Self {
        self.evidence_refs.push(id);
        self
    }

    /// Reference every record in an evidence slice.
    pub fn with_evidence(mut self, evidence: &[Evidence]) -> Self {
        self.evidence_refs.extend(evidence.iter().map(|e| e.id));
        self
    }
}
