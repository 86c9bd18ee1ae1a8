//! Single-check execution with timeout, retry and backoff.
//!
//! The executor is the fault boundary of the engine: probe failures,
//! timeouts and cancellation are all converted into issues on the returned
//! [`CheckResult`]. Nothing a probe adapter does can abort the run.

use std::time::Duration;

use tokio::time::Instant;

use postflight_core::obs;
use postflight_core::{
    Check, CheckResult, CheckStatus, Evidence, Issue, ProbeAdapter, ProbeCtx, Severity,
    TargetDescriptor,
};

/// How the executor treats classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Gather evidence and classify it.
    Full,

    /// Gather evidence only. Used for diagnostic coverage after an earlier
    /// phase already tripped its critical threshold: no new issues may be
    /// produced, synthetic ones included.
    EvidenceOnly,
}

enum ProbeOutcome {
    Ok(Vec<Evidence>),
    Exhausted(String),
    Fatal(String),
    Cancelled,
}

/// Execute one check against the target through the given adapter.
///
/// Guarantees exactly one result per invocation:
/// - transient probe failures (including per-attempt timeouts) are retried
///   with exponential backoff; on exhaustion a single synthetic HIGH
///   "probe unavailable" issue is recorded
/// - fatal adapter errors are not retried and record a synthetic CRITICAL
///   "check could not execute" issue with status `Errored`
/// - cancellation observed at any suspension point records a synthetic
///   MEDIUM issue with status `Cancelled`
///
/// The classifier always receives the full, final evidence slice.
pub async fn execute(
    check: &Check,
    adapter: &dyn ProbeAdapter,
    target: &TargetDescriptor,
    ctx: &ProbeCtx,
    mode: ExecMode,
) -> CheckResult {
    let started = Instant::now();
    let attempt_timeout = Duration::from_millis(check.timeout_ms);
    let mut attempts: u32 = 0;

    let outcome = loop {
        if ctx.is_cancelled() {
            break ProbeOutcome::Cancelled;
        }
        attempts += 1;

        let attempt = tokio::select! {
            res = tokio::time::timeout(attempt_timeout, adapter.probe(&check.id, target, ctx)) => {
                match res {
                    Ok(Ok(evidence)) => Ok(evidence),
                    Ok(Err(e)) if e.is_retryable() => Err((true, e.to_string())),
                    Ok(Err(e)) => Err((false, e.to_string())),
                    Err(_) => Err((
                        true,
                        format!("probe attempt timed out after {}ms", check.timeout_ms),
                    )),
                }
            }
            _ = ctx.cancelled() => break ProbeOutcome::Cancelled,
        };

        match attempt {
            Ok(evidence) => break ProbeOutcome::Ok(evidence),
            Err((false, reason)) => break ProbeOutcome::Fatal(reason),
            Err((true, reason)) => {
                if attempts >= check.retry.max_attempts {
                    break ProbeOutcome::Exhausted(reason);
                }
                let delay = check.retry.delay_after(attempts);
                obs::emit_check_retry(&check.id.0, attempts, delay.as_millis() as u64, &reason);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancelled() => break ProbeOutcome::Cancelled,
                }
            }
        }
    };

    let (status, evidence, issues) = match outcome {
        ProbeOutcome::Ok(evidence) => {
            let issues = match mode {
                ExecMode::Full => (check.classify)(&evidence),
                ExecMode::EvidenceOnly => Vec::new(),
            };
            (CheckStatus::Completed, evidence, issues)
        }
        ProbeOutcome::Exhausted(reason) => {
            let issues = synthetic(mode, || {
                Issue::new(
                    check.id.clone(),
                    Severity::High,
                    format!("probe unavailable after {attempts} attempt(s): {reason}"),
                )
                .with_remediation(
                    "verify the probe endpoint and platform credentials, then re-run validation",
                )
            });
            (CheckStatus::Completed, Vec::new(), issues)
        }
        ProbeOutcome::Fatal(reason) => {
            let issues = synthetic(mode, || {
                Issue::new(
                    check.id.clone(),
                    Severity::Critical,
                    format!("check could not execute: {reason}"),
                )
                .with_remediation("fix the probe configuration before trusting this validation run")
            });
            (CheckStatus::Errored, Vec::new(), issues)
        }
        ProbeOutcome::Cancelled => {
            let issues = synthetic(mode, || {
                Issue::new(
                    check.id.clone(),
                    Severity::Medium,
                    "check cancelled before completion",
                )
            });
            (CheckStatus::Cancelled, Vec::new(), issues)
        }
    };

    let result = CheckResult {
        check_id: check.id.clone(),
        phase_id: check.phase_id.clone(),
        status,
        attempts,
        evidence,
        issues,
        duration_ms: started.elapsed().as_millis() as u64,
    };

    obs::emit_check_finished(
        &result.check_id.0,
        match result.status {
            CheckStatus::Completed => "completed",
            CheckStatus::Errored => "errored",
            CheckStatus::Cancelled => "cancelled",
        },
        result.attempts,
        result.issues.len(),
    );

    result
}

fn synthetic(mode: ExecMode, build: impl FnOnce() -> Issue) -> Vec<Issue> {
    match mode {
        ExecMode::Full => vec![build()],
        ExecMode::EvidenceOnly => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FatalProbe, FlakyProbe, HangingProbe, ScriptedProbe};
    use postflight_core::{EvidenceKind, Platform, RetryPolicy};
    use serde_json::json;

    fn target() -> TargetDescriptor {
        TargetDescriptor {
            name: "app".to_string(),
            platform: Platform::Fixture,
        }
    }

    fn check() -> Check {
        Check::new("pod_status", "Pod status", "workload_status")
            .timeout_ms(200)
            .retry(RetryPolicy {
                max_attempts: 3,
                backoff_ms: 1,
            })
    }

    #[tokio::test]
    async fn test_successful_probe_is_classified() {
        let probe = ScriptedProbe::new().with(
            "pod_status",
            EvidenceKind::ProcessStatus,
            json!({ "status": "CrashLoopBackOff" }),
        );
        let check = check().classifier(|evidence| {
            evidence
                .iter()
                .filter(|e| e.payload["status"] == "CrashLoopBackOff")
                .map(|e| {
                    Issue::new(e.check_id.clone(), Severity::Critical, "pod in CrashLoopBackOff")
                        .with_evidence_ref(e.id)
                })
                .collect()
        });

        let result = execute(
            &check,
            &probe,
            &target(),
            &ProbeCtx::never_cancelled(),
            ExecMode::Full,
        )
        .await;

        assert_eq!(result.status, CheckStatus::Completed);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.evidence.len(), 1);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::Critical);
        assert_eq!(result.issues[0].evidence_refs, vec![result.evidence[0].id]);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_then_succeeds() {
        let probe = FlakyProbe::new(2, EvidenceKind::ProbeResponse, json!({ "status": 200 }));

        let result = execute(
            &check(),
            &probe,
            &target(),
            &ProbeCtx::never_cancelled(),
            ExecMode::Full,
        )
        .await;

        assert_eq!(result.status, CheckStatus::Completed);
        assert_eq!(result.attempts, 3);
        assert_eq!(probe.invocations(), 3);
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn test_retry_bound_and_single_high_issue() {
        // Permanently failing probe: exactly max_attempts invocations and
        // exactly one synthetic HIGH issue.
        let probe = FlakyProbe::always_failing();

        let result = execute(
            &check(),
            &probe,
            &target(),
            &ProbeCtx::never_cancelled(),
            ExecMode::Full,
        )
        .await;

        assert_eq!(result.status, CheckStatus::Completed);
        assert_eq!(result.attempts, 3);
        assert_eq!(probe.invocations(), 3);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::High);
        assert!(result.issues[0].message.contains("probe unavailable"));
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let probe = FatalProbe::new("missing credentials");

        let result = execute(
            &check(),
            &probe,
            &target(),
            &ProbeCtx::never_cancelled(),
            ExecMode::Full,
        )
        .await;

        assert_eq!(result.status, CheckStatus::Errored);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::Critical);
        assert!(result.issues[0].message.contains("could not execute"));
    }

    #[tokio::test]
    async fn test_hanging_probe_times_out_per_attempt() {
        let probe = HangingProbe::new();

        let result = execute(
            &check(),
            &probe,
            &target(),
            &ProbeCtx::never_cancelled(),
            ExecMode::Full,
        )
        .await;

        // Every attempt timed out; downgraded to one HIGH issue.
        assert_eq!(result.status, CheckStatus::Completed);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn test_cancellation_yields_medium_issue() {
        let (tx, rx) = tokio::sync::watch::channel(false);
        let ctx = ProbeCtx::new(rx);
        let probe = HangingProbe::new();
        let check = check().timeout_ms(60_000);

        let task = tokio::spawn({
            let target = target();
            async move { execute(&check, &probe, &target, &ctx, ExecMode::Full).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let result = task.await.unwrap();
        assert_eq!(result.status, CheckStatus::Cancelled);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].severity, Severity::Medium);
        assert!(result.issues[0].message.contains("cancelled"));
    }

    #[tokio::test]
    async fn test_evidence_only_mode_suppresses_issues() {
        let probe = ScriptedProbe::new().with(
            "pod_status",
            EvidenceKind::ProcessStatus,
            json!({ "status": "CrashLoopBackOff" }),
        );
        let check = check().classifier(|evidence| {
            evidence
                .iter()
                .map(|e| Issue::new(e.check_id.clone(), Severity::Critical, "boom"))
                .collect()
        });

        let result = execute(
            &check,
            &probe,
            &target(),
            &ProbeCtx::never_cancelled(),
            ExecMode::EvidenceOnly,
        )
        .await;

        assert_eq!(result.status, CheckStatus::Completed);
        assert_eq!(result.evidence.len(), 1);
        assert!(result.issues.is_empty());
    }
}
