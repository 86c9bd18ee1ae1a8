//! Issue aggregation with deterministic ordering.
//!
//! Merges issues from every phase into a single deduplicated list. Two
//! issues are duplicates when they share `(check_id, message)`; duplicates
//! merge by unioning their evidence references. Output ordering is stable:
//! severity rank, then phase order, then check id, then message — so
//! repeated aggregation over identical results is byte-identical, which
//! keeps reports reproducible and snapshot-testable.

use std::collections::{BTreeMap, BTreeSet};

use crate::check::CheckId;
use crate::evidence::EvidenceId;
use crate::issue::Issue;
use crate::run::PhaseResult;

struct Merged {
    issue: Issue,
    refs: BTreeSet<EvidenceId>,
    phase_order: u32,
}

/// Merge, deduplicate and sort issues from all phase results.
pub fn aggregate(phase_results: &[PhaseResult]) -> Vec<Issue> {
    let mut merged: BTreeMap<(CheckId, String), Merged> = BTreeMap::new();

    for phase in phase_results {
        for check in &phase.check_results {
            for issue in &check.issues {
                let key = (issue.check_id.clone(), issue.message.clone());
                let entry = merged.entry(key).or_insert_with(|| Merged {
                    issue: issue.clone(),
                    refs: BTreeSet::new(),
                    phase_order: phase.order,
                });
                entry.refs.extend(issue.evidence_refs.iter().copied());
                // Duplicates should agree on severity; if they don't,
                // keep the more severe classification.
                if issue.severity < entry.issue.severity {
                    entry.issue.severity = issue.severity;
                }
                entry.phase_order = entry.phase_order.min(phase.order);
            }
        }
    }

    let mut issues: Vec<(u32, Issue)> = merged
        .into_values()
        .map(|m| {
            let mut issue = m.issue;
            issue.evidence_refs = m.refs.into_iter().collect();
            (m.phase_order, issue)
        })
        .collect();

    issues.sort_by(|(order_a, a), (order_b, b)| {
        (a.severity.rank(), *order_a, &a.check_id, &a.message).cmp(&(
            b.severity.rank(),
            *order_b,
            &b.check_id,
            &b.message,
        ))
    });

    issues.into_iter().map(|(_, issue)| issue).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::PhaseId;
    use crate::issue::Severity;
    use crate::run::{CheckResult, CheckStatus, PhaseStatus};

    fn result_with_issues(phase: &str, order: u32, issues: Vec<Issue>) -> PhaseResult {
        PhaseResult {
            phase_id: PhaseId::from(phase),
            order,
            status: PhaseStatus::Complete,
            check_results: vec![CheckResult {
                check_id: CheckId::from("check"),
                phase_id: PhaseId::from(phase),
                status: CheckStatus::Completed,
                attempts: 1,
                evidence: Vec::new(),
                issues,
                duration_ms: 5,
            }],
        }
    }

    #[test]
    fn test_sorted_by_severity_then_order() {
        let phases = vec![
            result_with_issues(
                "late",
                20,
                vec![
                    Issue::new(CheckId::from("c2"), Severity::Critical, "late critical"),
                    Issue::new(CheckId::from("c2"), Severity::Low, "late low"),
                ],
            ),
            result_with_issues(
                "early",
                10,
                vec![Issue::new(CheckId::from("c1"), Severity::High, "early high")],
            ),
        ];

        let issues = aggregate(&phases);
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(messages, vec!["late critical", "early high", "late low"]);
    }

    #[test]
    fn test_duplicates_merge_evidence_refs() {
        let a = EvidenceId::new();
        let b = EvidenceId::new();
        let shared = EvidenceId::new();

        let phases = vec![result_with_issues(
            "p",
            10,
            vec![
                Issue::new(CheckId::from("c"), Severity::High, "dup")
                    .with_evidence_ref(a)
                    .with_evidence_ref(shared),
                Issue::new(CheckId::from("c"), Severity::High, "dup")
                    .with_evidence_ref(b)
                    .with_evidence_ref(shared),
            ],
        )];

        let issues = aggregate(&phases);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].evidence_refs.len(), 3);
    }

    #[test]
    fn test_distinct_messages_not_merged() {
        let phases = vec![result_with_issues(
            "p",
            10,
            vec![
                Issue::new(CheckId::from("c"), Severity::High, "first"),
                Issue::new(CheckId::from("c"), Severity::High, "second"),
            ],
        )];

        assert_eq!(aggregate(&phases).len(), 2);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let phases = vec![
            result_with_issues(
                "p1",
                10,
                vec![
                    Issue::new(CheckId::from("c1"), Severity::Medium, "m")
                        .with_evidence_ref(EvidenceId::new()),
                    Issue::new(CheckId::from("c1"), Severity::Critical, "boom"),
                ],
            ),
            result_with_issues(
                "p2",
                20,
                vec![Issue::new(CheckId::from("c2"), Severity::Medium, "m2")],
            ),
        ];

        let first = serde_json::to_string(&aggregate(&phases)).unwrap();
        let second = serde_json::to_string(&aggregate(&phases)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_results_aggregate_to_nothing() {
        assert!(aggregate(&[]).is_empty());
    }
}
