//! Strict-fail verdict rules.
//!
//! The rule list is evaluated in order, first match wins. There is no
//! default-to-pass branch: PASS is only reachable when the run completed
//! every phase and no blocking issue exists.

use serde::{Deserialize, Serialize};

use crate::issue::{Issue, Severity};
use crate::run::RunCompleteness;

/// Final pass/fail decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictResult {
    Pass,
    Fail,
}

/// What the operator should do with the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackAdvice {
    /// Roll back now.
    Immediate,

    /// Leave the deployment up but watch it closely.
    MonitorClosely,

    /// Safe to proceed.
    Proceed,
}

impl std::fmt::Display for VerdictResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            VerdictResult::Pass => "pass",
            VerdictResult::Fail => "fail",
        })
    }
}

impl std::fmt::Display for RollbackAdvice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RollbackAdvice::Immediate => "immediate",
            RollbackAdvice::MonitorClosely => "monitor_closely",
            RollbackAdvice::Proceed => "proceed",
        })
    }
}

/// The run's final decision, computed exactly once from the aggregated
/// issue set and run completeness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Pass or fail.
    pub result: VerdictResult,

    /// Rollback recommendation.
    pub rollback: RollbackAdvice,

    /// Why this verdict was reached.
    pub justification: String,
}

impl Verdict {
    /// Whether the run passed.
    pub fn passed(&self) -> bool {
        self.result == VerdictResult::Pass
    }
}

/// Apply the ordered rule set to the aggregated issues.
///
/// 1. Incomplete run: FAIL / Immediate.
/// 2. Any CRITICAL issue: FAIL / Immediate.
/// 3. Any HIGH issue: FAIL / MonitorClosely.
/// 4. Only MEDIUM/LOW issues: PASS / Proceed with advisory note.
/// 5. No issues: PASS / Proceed.
pub fn decide(issues: &[Issue], completeness: RunCompleteness) -> Verdict {
    if completeness != RunCompleteness::Complete {
        return Verdict {
            result: VerdictResult::Fail,
            rollback: RollbackAdvice::Immediate,
            justification: "validation run did not complete all phases".to_string(),
        };
    }

    let count = |s: Severity| issues.iter().filter(|i| i.severity == s).count();

    let criticals = count(Severity::Critical);
    if criticals > 0 {
        return Verdict {
            result: VerdictResult::Fail,
            rollback: RollbackAdvice::Immediate,
            justification: format!("{criticals} critical issue(s) found"),
        };
    }

    let highs = count(Severity::High);
    if highs > 0 {
        return Verdict {
            result: VerdictResult::Fail,
            rollback: RollbackAdvice::MonitorClosely,
            justification: format!("{highs} high-severity issue(s) found"),
        };
    }

    if !issues.is_empty() {
        return Verdict {
            result: VerdictResult::Pass,
            rollback: RollbackAdvice::Proceed,
            justification: format!(
                "no blocking issues; {} advisory finding(s) recorded",
                issues.len()
            ),
        };
    }

    Verdict {
        result: VerdictResult::Pass,
        rollback: RollbackAdvice::Proceed,
        justification: "all checks passed with no findings".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckId;

    fn issue(severity: Severity, message: &str) -> Issue {
        Issue::new(CheckId::from("check"), severity, message)
    }

    #[test]
    fn test_incomplete_run_always_fails() {
        // Even a spotless issue list cannot pass an incomplete run.
        let verdict = decide(&[], RunCompleteness::Incomplete);
        assert_eq!(verdict.result, VerdictResult::Fail);
        assert_eq!(verdict.rollback, RollbackAdvice::Immediate);
        assert!(verdict.justification.contains("did not complete"));
    }

    #[test]
    fn test_any_critical_fails_immediately() {
        let issues = vec![
            issue(Severity::Low, "noise"),
            issue(Severity::Critical, "pod in CrashLoopBackOff"),
        ];
        let verdict = decide(&issues, RunCompleteness::Complete);
        assert_eq!(verdict.result, VerdictResult::Fail);
        assert_eq!(verdict.rollback, RollbackAdvice::Immediate);
    }

    #[test]
    fn test_high_without_critical_monitors() {
        let issues = vec![issue(Severity::High, "probe unavailable")];
        let verdict = decide(&issues, RunCompleteness::Complete);
        assert_eq!(verdict.result, VerdictResult::Fail);
        assert_eq!(verdict.rollback, RollbackAdvice::MonitorClosely);
    }

    #[test]
    fn test_advisories_pass_with_note() {
        let issues = vec![
            issue(Severity::Medium, "elevated latency"),
            issue(Severity::Low, "deprecation warning in logs"),
        ];
        let verdict = decide(&issues, RunCompleteness::Complete);
        assert_eq!(verdict.result, VerdictResult::Pass);
        assert_eq!(verdict.rollback, RollbackAdvice::Proceed);
        assert!(verdict.justification.contains("2 advisory"));
    }

    #[test]
    fn test_clean_run_passes() {
        let verdict = decide(&[], RunCompleteness::Complete);
        assert_eq!(verdict.result, VerdictResult::Pass);
        assert_eq!(verdict.rollback, RollbackAdvice::Proceed);
    }

    #[test]
    fn test_completeness_outranks_severities() {
        // Rule 1 fires before rule 2 even when criticals are present.
        let issues = vec![issue(Severity::Critical, "boom")];
        let verdict = decide(&issues, RunCompleteness::Incomplete);
        assert!(verdict.justification.contains("did not complete"));
    }
}
