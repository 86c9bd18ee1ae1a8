//! Evidence records gathered by probe adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::check::CheckId;

/// Unique identifier for a single evidence record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EvidenceId(pub Uuid);

impl EvidenceId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EvidenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of observation a piece of evidence captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// State of a process, container or pod.
    ProcessStatus,

    /// A single captured log line.
    LogLine,

    /// Response from an active probe (HTTP health endpoint, TCP dial).
    ProbeResponse,

    /// A sampled metric value (CPU, memory, latency).
    MetricSample,

    /// Declarative state of a platform resource (deployment, service).
    ResourceState,
}

/// One observation made against the target, attributed to the check that
/// requested it and the probe that produced it.
///
/// Evidence is immutable once created. Issues reference evidence by id
/// rather than copying it, so a single record can back several findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    /// Identifier used by `Issue::evidence_refs`.
    pub id: EvidenceId,

    /// The check this evidence was gathered for.
    pub check_id: CheckId,

    /// When the observation was made.
    pub observed_at: DateTime<Utc>,

    /// Observation kind.
    pub kind: EvidenceKind,

    /// Opaque structured payload; its shape is a contract between the
    /// probe adapter and the check's classifier.
    pub payload: Value,

    /// Identifier of the probe that produced this record.
    pub source: String,
}

impl Evidence {
    /// Create a new evidence record stamped with the current time.
    pub fn new(
        check_id: CheckId,
        kind: EvidenceKind,
        payload: Value,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: EvidenceId::new(),
            check_id,
            observed_at: Utc::now(),
            kind,
            payload,
            source: source.into(),
        }
    }
}
