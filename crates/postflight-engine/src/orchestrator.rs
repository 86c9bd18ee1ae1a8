//! Phase sequencing and bounded concurrent check execution.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

use postflight_core::obs;
use postflight_core::{
    aggregate, decide, Check, CheckResult, CheckStatus, ConfigError, Issue, Phase, PhaseResult,
    PhaseStatus, ProbeAdapter, ProbeCtx, RunConfig, Severity, TargetDescriptor, ValidationRun,
};

use crate::executor::{execute, ExecMode};

/// Sequences phases strictly by `order`, fans each phase's checks out over
/// a bounded worker pool, and fans results back in through task handles —
/// the run aggregate itself is only ever touched from this single task.
pub struct Orchestrator;

impl Orchestrator {
    /// Execute a validation run.
    ///
    /// The only hard failure is [`ConfigError`], raised before any phase
    /// executes. Everything that goes wrong later is recorded on the run
    /// itself and reflected in the verdict.
    pub async fn run(
        plan: Vec<Phase>,
        adapter: Arc<dyn ProbeAdapter>,
        config: &RunConfig,
        cancel: watch::Receiver<bool>,
    ) -> Result<ValidationRun, ConfigError> {
        let phases = config.effective_plan(plan)?;

        let target = TargetDescriptor {
            name: config.target.clone(),
            platform: config.platform,
        };
        let mut run = ValidationRun::start(target.clone(), config.depth);
        let run_id = run.run_id.to_string();
        let span_id = run_id.clone();
        let fut = async move {
            obs::emit_run_started(
                &run_id,
                &config.target,
                &config.platform.to_string(),
                &config.depth.to_string(),
            );

            let workers = config
                .max_workers
                .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
                .unwrap_or(4)
                .max(1);
            let pool = Arc::new(Semaphore::new(workers));
            let ctx = ProbeCtx::new(cancel);
            let grace = Duration::from_millis(config.grace_period_ms);

            // Set once a phase trips its critical threshold: later phases run
            // evidence-only (fail_fast off) or are skipped (fail_fast on).
            let mut degraded = false;
            let mut halted = false;
            let mut cancelled = false;

            for phase in &phases {
                if halted || cancelled || ctx.is_cancelled() {
                    run.phase_results.push(PhaseResult {
                        phase_id: phase.id.clone(),
                        order: phase.order,
                        status: PhaseStatus::Skipped,
                        check_results: Vec::new(),
                    });
                    continue;
                }

                let mode = if degraded {
                    ExecMode::EvidenceOnly
                } else {
                    ExecMode::Full
                };

                obs::emit_phase_started(&run_id, &phase.id.0, phase.order, phase.checks.len());

                let handles = spawn_checks(phase, &adapter, &target, &ctx, &pool, mode);
                let (check_results, interrupted) =
                    gather_phase(handles, &phase.checks, &ctx, grace).await;

                let phase_cancelled = interrupted
                    || ctx.is_cancelled()
                    || check_results
                        .iter()
                        .any(|r| r.status == CheckStatus::Cancelled);

                let status = if phase_cancelled {
                    PhaseStatus::Incomplete
                } else if mode == ExecMode::EvidenceOnly {
                    PhaseStatus::EvidenceOnly
                } else {
                    PhaseStatus::Complete
                };

                let criticals = check_results
                    .iter()
                    .flat_map(|r| r.issues.iter())
                    .filter(|i| i.severity == Severity::Critical)
                    .count();

                obs::emit_phase_finished(
                    &run_id,
                    &phase.id.0,
                    match status {
                        PhaseStatus::Complete => "complete",
                        PhaseStatus::EvidenceOnly => "evidence_only",
                        PhaseStatus::Incomplete => "incomplete",
                        PhaseStatus::Skipped => "skipped",
                    },
                    criticals,
                );

                run.phase_results.push(PhaseResult {
                    phase_id: phase.id.clone(),
                    order: phase.order,
                    status,
                    check_results,
                });

                if phase_cancelled {
                    obs::emit_run_cancelled(&run_id, &phase.id.0);
                    cancelled = true;
                    continue;
                }

                if status == PhaseStatus::Complete {
                    let threshold = phase.halt_on_critical_count.unwrap_or(1).max(1) as usize;
                    if criticals >= threshold {
                        if config.fail_fast {
                            halted = true;
                        } else {
                            degraded = true;
                        }
                    }
                }
            }

            run.aggregated_issues = aggregate(&run.phase_results);
            let completeness = run.completeness();
            let verdict = decide(&run.aggregated_issues, completeness);

            obs::emit_verdict_decided(
                &run_id,
                &verdict.result.to_string(),
                &verdict.rollback.to_string(),
                run.aggregated_issues.len(),
            );

            run.finish(verdict);
            obs::emit_run_finished(
                &run_id,
                run.duration_ms().unwrap_or(0),
                run.verdict.as_ref().map(|v| v.passed()).unwrap_or(false),
            );

            Ok(run)
        };
        obs::instrument_run(&span_id, fut).await
    }
}

fn spawn_checks(
    phase: &Phase,
    adapter: &Arc<dyn ProbeAdapter>,
    target: &TargetDescriptor,
    ctx: &ProbeCtx,
    pool: &Arc<Semaphore>,
    mode: ExecMode,
) -> Vec<JoinHandle<CheckResult>> {
    phase
        .checks
        .iter()
        .map(|check| {
            let check = check.clone();
            let adapter = adapter.clone();
            let target = target.clone();
            let ctx = ctx.clone();
            let pool = pool.clone();
            tokio::spawn(async move {
                // The pool is never closed, so acquisition only fails if
                // the semaphore is dropped; running unthrottled then is
                // still correct.
                let _permit = pool.acquire_owned().await.ok();
                execute(&check, adapter.as_ref(), &target, &ctx, mode).await
            })
        })
        .collect()
}

/// End-of-phase barrier: await every check handle in spawn order.
///
/// Once cancellation is observed, remaining handles share a single grace
/// deadline; stragglers are aborted and recorded as cancelled results.
/// Returns the results plus whether any check had to be abandoned.
async fn gather_phase(
    handles: Vec<JoinHandle<CheckResult>>,
    checks: &[Check],
    ctx: &ProbeCtx,
    grace: Duration,
) -> (Vec<CheckResult>, bool) {
    let mut results = Vec::with_capacity(handles.len());
    let mut interrupted = false;
    let mut deadline: Option<tokio::time::Instant> = None;

    for (mut handle, check) in handles.into_iter().zip(checks) {
        if deadline.is_none() && ctx.is_cancelled() {
            deadline = Some(tokio::time::Instant::now() + grace);
        }

        let joined = match deadline {
            Some(at) => match tokio::time::timeout_at(at, &mut handle).await {
                Ok(joined) => Some(joined),
                Err(_) => {
                    handle.abort();
                    None
                }
            },
            None => {
                tokio::select! {
                    joined = &mut handle => Some(joined),
                    _ = ctx.cancelled() => {
                        let at = tokio::time::Instant::now() + grace;
                        deadline = Some(at);
                        match tokio::time::timeout_at(at, &mut handle).await {
                            Ok(joined) => Some(joined),
                            Err(_) => {
                                handle.abort();
                                None
                            }
                        }
                    }
                }
            }
        };

        let result = match joined {
            Some(Ok(result)) => result,
            // Executor tasks don't panic by contract; if one does anyway,
            // record it as an errored check rather than losing the run.
            Some(Err(join_err)) => errored_result(check, join_err.to_string()),
            None => {
                interrupted = true;
                abandoned_result(check)
            }
        };
        results.push(result);
    }

    (results, interrupted)
}

fn errored_result(check: &Check, reason: String) -> CheckResult {
    CheckResult {
        check_id: check.id.clone(),
        phase_id: check.phase_id.clone(),
        status: CheckStatus::Errored,
        attempts: 0,
        evidence: Vec::new(),
        issues: vec![Issue::new(
            check.id.clone(),
            Severity::Critical,
            format!("check could not execute: {reason}"),
        )],
        duration_ms: 0,
    }
}

fn abandoned_result(check: &Check) -> CheckResult {
    CheckResult {
        check_id: check.id.clone(),
        phase_id: check.phase_id.clone(),
        status: CheckStatus::Cancelled,
        attempts: 0,
        evidence: Vec::new(),
        issues: vec![Issue::new(
            check.id.clone(),
            Severity::Medium,
            "check cancelled before completion",
        )],
        duration_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedProbe;
    use postflight_core::{EvidenceKind, Platform, ValidationDepth, VerdictResult};
    use serde_json::json;

    fn config() -> RunConfig {
        RunConfig::new("app", Platform::Fixture, ValidationDepth::Standard)
    }

    fn quiet_phase(id: &str, order: u32, checks: usize) -> Phase {
        let mut phase = Phase::new(id, id, order);
        for i in 0..checks {
            phase = phase.check(Check::new(format!("{id}_{i}"), "check", id).timeout_ms(500));
        }
        phase
    }

    #[tokio::test]
    async fn test_config_error_before_any_phase() {
        let (_tx, rx) = watch::channel(false);
        let err = Orchestrator::run(Vec::new(), Arc::new(ScriptedProbe::new()), &config(), rx)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPlan));
    }

    #[tokio::test]
    async fn test_clean_run_completes_all_phases() {
        let (_tx, rx) = watch::channel(false);
        let plan = vec![quiet_phase("a", 10, 3), quiet_phase("b", 20, 2)];

        let run = Orchestrator::run(plan, Arc::new(ScriptedProbe::new()), &config(), rx)
            .await
            .unwrap();

        assert_eq!(run.phase_results.len(), 2);
        assert!(run
            .phase_results
            .iter()
            .all(|p| p.status == PhaseStatus::Complete));
        assert_eq!(run.phase_results[0].check_results.len(), 3);
        let verdict = run.verdict.as_ref().unwrap();
        assert_eq!(verdict.result, VerdictResult::Pass);
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_phase_results_follow_plan_order() {
        let (_tx, rx) = watch::channel(false);
        // Deliberately unsorted input.
        let plan = vec![
            quiet_phase("late", 30, 1),
            quiet_phase("early", 10, 1),
            quiet_phase("mid", 20, 1),
        ];

        let run = Orchestrator::run(plan, Arc::new(ScriptedProbe::new()), &config(), rx)
            .await
            .unwrap();

        let orders: Vec<u32> = run.phase_results.iter().map(|p| p.order).collect();
        assert_eq!(orders, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_critical_triggers_evidence_only_when_not_fail_fast() {
        let (_tx, rx) = watch::channel(false);
        let probe = ScriptedProbe::new()
            .with(
                "first_0",
                EvidenceKind::ProcessStatus,
                json!({ "bad": true }),
            )
            .with("second_0", EvidenceKind::LogLine, json!({ "bad": true }));

        let critical = |evidence: &[postflight_core::Evidence]| -> Vec<Issue> {
            evidence
                .iter()
                .map(|e| Issue::new(e.check_id.clone(), Severity::Critical, "observed failure"))
                .collect()
        };

        let plan = vec![
            Phase::new("first", "First", 10)
                .check(Check::new("first_0", "c", "first").classifier(critical)),
            Phase::new("second", "Second", 20)
                .check(Check::new("second_0", "c", "second").classifier(critical)),
        ];

        let run = Orchestrator::run(plan, Arc::new(probe), &config(), rx)
            .await
            .unwrap();

        assert_eq!(run.phase_results[0].status, PhaseStatus::Complete);
        // Second phase still ran (evidence gathered) but produced no issues.
        assert_eq!(run.phase_results[1].status, PhaseStatus::EvidenceOnly);
        assert_eq!(run.phase_results[1].check_results[0].evidence.len(), 1);
        assert!(run.phase_results[1].check_results[0].issues.is_empty());
        // Completeness holds, so FAIL comes from the critical itself.
        assert_eq!(run.aggregated_issues.len(), 1);
        assert!(!run.verdict.as_ref().unwrap().passed());
    }
}
