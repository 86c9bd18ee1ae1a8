//! In-memory probe adapters for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use postflight_core::{
    AdapterError, CheckId, Evidence, EvidenceKind, ProbeAdapter, ProbeCtx, TargetDescriptor,
};

/// Probe that replays scripted observations keyed by check id.
///
/// Checks without a script entry get an empty evidence slice, which lets a
/// single scripted probe back a whole multi-phase plan.
#[derive(Default)]
pub struct ScriptedProbe {
    observations: HashMap<CheckId, Vec<(EvidenceKind, Value)>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation for a check. Chainable.
    pub fn with(mut self, check_id: &str, kind: EvidenceKind, payload: Value) -> Self {
        self.observations
            .entry(CheckId::from(check_id))
            .or_default()
            .push((kind, payload));
        self
    }
}

#[async_trait]
impl ProbeAdapter for ScriptedProbe {
    fn source(&self) -> &str {
        "scripted"
    }

    async fn probe(
        &self,
        check_id: &CheckId,
        _target: &TargetDescriptor,
        _ctx: &ProbeCtx,
    ) -> Result<Vec<Evidence>, AdapterError> {
        let observations = self.observations.get(check_id).cloned().unwrap_or_default();
        Ok(observations
            .into_iter()
            .map(|(kind, payload)| Evidence::new(check_id.clone(), kind, payload, self.source()))
            .collect())
    }
}

/// Probe that fails transiently a fixed number of times before succeeding,
/// counting every invocation.
pub struct FlakyProbe {
    /// `None` means the probe never succeeds.
    failures_before_success: Option<u32>,
    invocations: AtomicU32,
    kind: EvidenceKind,
    payload: Value,
}

impl FlakyProbe {
    /// Fail `failures` times, then return one evidence record per call.
    pub fn new(failures: u32, kind: EvidenceKind, payload: Value) -> Self {
        Self {
            failures_before_success: Some(failures),
            invocations: AtomicU32::new(0),
            kind,
            payload,
        }
    }

    /// A probe that fails transiently on every call.
    pub fn always_failing() -> Self {
        Self {
            failures_before_success: None,
            invocations: AtomicU32::new(0),
            kind: EvidenceKind::ProbeResponse,
            payload: Value::Null,
        }
    }

    /// Total number of probe calls made so far.
    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeAdapter for FlakyProbe {
    fn source(&self) -> &str {
        "flaky"
    }

    async fn probe(
        &self,
        check_id: &CheckId,
        _target: &TargetDescriptor,
        _ctx: &ProbeCtx,
    ) -> Result<Vec<Evidence>, AdapterError> {
        let call = self.invocations.fetch_add(1, Ordering::SeqCst);
        match self.failures_before_success {
            Some(failures) if call >= failures => Ok(vec![Evidence::new(
                check_id.clone(),
                self.kind,
                self.payload.clone(),
                self.source(),
            )]),
            _ => Err(AdapterError::transient("connection reset by peer")),
        }
    }
}

/// Probe that always fails fatally.
pub struct FatalProbe {
    reason: String,
}

impl FatalProbe {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ProbeAdapter for FatalProbe {
    fn source(&self) -> &str {
        "fatal"
    }

    async fn probe(
        &self,
        _check_id: &CheckId,
        _target: &TargetDescriptor,
        _ctx: &ProbeCtx,
    ) -> Result<Vec<Evidence>, AdapterError> {
        Err(AdapterError::fatal(self.reason.clone()))
    }
}

/// Probe that never returns and ignores cancellation; only the executor's
/// per-attempt timeout or the run's grace period can stop it.
pub struct HangingProbe;

impl HangingProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HangingProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeAdapter for HangingProbe {
    fn source(&self) -> &str {
        "hanging"
    }

    async fn probe(
        &self,
        _check_id: &CheckId,
        _target: &TargetDescriptor,
        _ctx: &ProbeCtx,
    ) -> Result<Vec<Evidence>, AdapterError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

/// Probe that waits a fixed delay before answering, honoring cancellation.
pub struct SlowProbe {
    delay: Duration,
    kind: EvidenceKind,
    payload: Value,
}

impl SlowProbe {
    pub fn new(delay: Duration, kind: EvidenceKind, payload: Value) -> Self {
        Self {
            delay,
            kind,
            payload,
        }
    }
}

#[async_trait]
impl ProbeAdapter for SlowProbe {
    fn source(&self) -> &str {
        "slow"
    }

    async fn probe(
        &self,
        check_id: &CheckId,
        _target: &TargetDescriptor,
        ctx: &ProbeCtx,
    ) -> Result<Vec<Evidence>, AdapterError> {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => Ok(vec![Evidence::new(
                check_id.clone(),
                self.kind,
                self.payload.clone(),
                self.source(),
            )]),
            _ = ctx.cancelled() => Err(AdapterError::transient("probe interrupted by cancellation")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postflight_core::Platform;
    use serde_json::json;

    fn target() -> TargetDescriptor {
        TargetDescriptor {
            name: "app".to_string(),
            platform: Platform::Fixture,
        }
    }

    #[tokio::test]
    async fn test_scripted_probe_replays_observations() {
        let probe = ScriptedProbe::new()
            .with("a", EvidenceKind::LogLine, json!({ "line": "ok" }))
            .with("a", EvidenceKind::LogLine, json!({ "line": "also ok" }));

        let evidence = probe
            .probe(&CheckId::from("a"), &target(), &ProbeCtx::never_cancelled())
            .await
            .unwrap();
        assert_eq!(evidence.len(), 2);
        assert_eq!(evidence[0].source, "scripted");

        let empty = probe
            .probe(&CheckId::from("b"), &target(), &ProbeCtx::never_cancelled())
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_flaky_probe_recovers() {
        let probe = FlakyProbe::new(1, EvidenceKind::ProbeResponse, json!({}));
        let ctx = ProbeCtx::never_cancelled();
        let id = CheckId::from("c");

        assert!(probe.probe(&id, &target(), &ctx).await.is_err());
        assert!(probe.probe(&id, &target(), &ctx).await.is_ok());
        assert_eq!(probe.invocations(), 2);
    }
}
