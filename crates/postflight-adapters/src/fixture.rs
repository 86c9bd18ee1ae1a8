//! Fixture probe: replays recorded observations from a JSON file.
//!
//! The file maps check ids to observation lists:
//!
//! ```json
//! {
//!   "workload_state": [
//!     { "kind": "process_status",
//!       "payload": { "status": "Running", "ready": true },
//!       "source": "kubectl" }
//!   ]
//! }
//! ```
//!
//! Useful for CI gating (validate a recorded deployment snapshot) and for
//! exercising the full engine without a live target.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use postflight_core::{
    AdapterError, CheckId, Evidence, EvidenceKind, ProbeAdapter, ProbeCtx, TargetDescriptor,
};

/// Failure to load a fixture file. Raised at startup, before any phase
/// runs.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    #[error("fixture file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One recorded observation.
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureObservation {
    /// Evidence kind.
    pub kind: EvidenceKind,

    /// Evidence payload.
    pub payload: Value,

    /// Probe identifier recorded in the fixture; defaults to "fixture".
    #[serde(default)]
    pub source: Option<String>,
}

/// Probe that serves observations from a loaded fixture.
///
/// A check with no fixture entry is a fatal probe error: a recorded
/// snapshot that is missing evidence must surface as "check could not
/// execute", not silently pass.
#[derive(Debug)]
pub struct FixtureProbe {
    observations: HashMap<String, Vec<FixtureObservation>>,
}

impl FixtureProbe {
    /// Load a fixture from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path)?;
        let observations = serde_json::from_str(&raw)?;
        Ok(Self { observations })
    }

    /// Build a fixture directly from parsed observations.
    pub fn from_observations(observations: HashMap<String, Vec<FixtureObservation>>) -> Self {
        Self { observations }
    }
}

#[async_trait]
impl ProbeAdapter for FixtureProbe {
    fn source(&self) -> &str {
        "fixture"
    }

    async fn probe(
        &self,
        check_id: &CheckId,
        _target: &TargetDescriptor,
        _ctx: &ProbeCtx,
    ) -> Result<Vec<Evidence>, AdapterError> {
        let observations = self.observations.get(&check_id.0).ok_or_else(|| {
            AdapterError::fatal(format!(
                "no fixture evidence recorded for check '{check_id}'"
            ))
        })?;

        Ok(observations
            .iter()
            .map(|obs| {
                Evidence::new(
                    check_id.clone(),
                    obs.kind,
                    obs.payload.clone(),
                    obs.source.clone().unwrap_or_else(|| "fixture".to_string()),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postflight_core::Platform;
    use std::io::Write;

    fn target() -> TargetDescriptor {
        TargetDescriptor {
            name: "recorded-deploy".to_string(),
            platform: Platform::Fixture,
        }
    }

    const FIXTURE: &str = r#"{
        "workload_state": [
            { "kind": "process_status",
              "payload": { "status": "Running", "ready": true },
              "source": "kubectl" },
            { "kind": "process_status",
              "payload": { "status": "CrashLoopBackOff" } }
        ]
    }"#;

    #[tokio::test]
    async fn test_fixture_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();

        let probe = FixtureProbe::from_path(file.path()).unwrap();
        let evidence = probe
            .probe(
                &CheckId::from("workload_state"),
                &target(),
                &ProbeCtx::never_cancelled(),
            )
            .await
            .unwrap();

        assert_eq!(evidence.len(), 2);
        assert_eq!(evidence[0].kind, EvidenceKind::ProcessStatus);
        assert_eq!(evidence[0].source, "kubectl");
        assert_eq!(evidence[1].source, "fixture");
        assert_eq!(evidence[1].payload["status"], "CrashLoopBackOff");
    }

    #[tokio::test]
    async fn test_missing_check_is_fatal() {
        let probe = FixtureProbe::from_observations(HashMap::new());
        let err = probe
            .probe(
                &CheckId::from("ghost"),
                &target(),
                &ProbeCtx::never_cancelled(),
            )
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        let err = FixtureProbe::from_path(file.path()).unwrap_err();
        assert!(matches!(err, FixtureError::Json(_)));
    }
}
