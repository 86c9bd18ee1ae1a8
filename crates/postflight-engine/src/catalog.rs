//! Builtin phase plan and evidence classifiers.
//!
//! The phase ladder mirrors a paranoid post-deployment checklist: confirm
//! the target exists, confirm workloads are healthy, scan logs, exercise
//! health endpoints, then look at resource pressure. Later phases assume
//! earlier evidence exists, hence the fixed ordering. Validation depth
//! selects how far down the ladder a run goes.

use postflight_core::{
    Check, Evidence, EvidenceKind, Issue, Phase, RetryPolicy, Severity, ValidationDepth,
};

/// Build the phase plan for a validation depth.
pub fn plan_for(depth: ValidationDepth) -> Vec<Phase> {
    let retry = if depth >= ValidationDepth::Paranoid {
        RetryPolicy {
            max_attempts: 5,
            backoff_ms: 250,
        }
    } else {
        RetryPolicy::default()
    };

    let mut phases = vec![
        Phase::new("preflight", "Target preflight", 10).check(
            Check::new("target_reachable", "Target reachable", "preflight")
                .retry(retry)
                .classifier(classify_reachability),
        ),
        Phase::new("workload_status", "Workload status", 20).check(
            Check::new("workload_state", "Workload state", "workload_status")
                .retry(retry)
                .classifier(classify_workload),
        ),
    ];

    if depth >= ValidationDepth::Standard {
        phases.push(
            Phase::new("log_scan", "Log scan", 30).check(
                Check::new("recent_logs", "Recent log entries", "log_scan")
                    .retry(retry)
                    .classifier(classify_logs),
            ),
        );
    }

    if depth >= ValidationDepth::Comprehensive {
        phases.push(
            Phase::new("endpoint_health", "Endpoint health", 40).check(
                Check::new("health_endpoint", "Health endpoint", "endpoint_health")
                    .retry(retry)
                    .classifier(classify_endpoints),
            ),
        );
    }

    if depth >= ValidationDepth::Paranoid {
        phases.push(
            Phase::new("resource_pressure", "Resource pressure", 50).check(
                Check::new("resource_usage", "Resource usage", "resource_pressure")
                    .retry(retry)
                    .classifier(classify_resources),
            ),
        );
    }

    phases
}

/// Preflight: the probe must have seen the target at all.
fn classify_reachability(evidence: &[Evidence]) -> Vec<Issue> {
    let mut issues = Vec::new();

    if evidence.is_empty() {
        issues.push(Issue::new(
            "target_reachable".into(),
            Severity::High,
            "probe returned no evidence for the target",
        ));
        return issues;
    }

    for e in evidence {
        if e.payload["reachable"] == false {
            issues.push(
                Issue::new(
                    e.check_id.clone(),
                    Severity::Critical,
                    "target is not reachable",
                )
                .with_evidence_ref(e.id)
                .with_remediation("confirm the deployment exists and the probe has access to it"),
            );
        }
    }

    issues
}

const CRASHED_STATES: &[&str] = &["CrashLoopBackOff", "Error", "OOMKilled", "Failed"];
const NOT_READY_STATES: &[&str] = &["Pending", "ContainerCreating", "Unknown"];

/// Workload status ladder: crashed states are critical, not-ready states
/// are high, nonzero restart counts are advisory.
fn classify_workload(evidence: &[Evidence]) -> Vec<Issue> {
    let mut issues = Vec::new();

    for e in evidence {
        if e.kind != EvidenceKind::ProcessStatus && e.kind != EvidenceKind::ResourceState {
            continue;
        }

        if let Some(status) = e.payload["status"].as_str() {
            if CRASHED_STATES.contains(&status) {
                issues.push(
                    Issue::new(e.check_id.clone(), Severity::Critical, format!("pod in {status}"))
                        .with_evidence_ref(e.id)
                        .with_remediation(
                            "roll back the deployment and inspect container exit codes",
                        ),
                );
            } else if NOT_READY_STATES.contains(&status) {
                issues.push(
                    Issue::new(
                        e.check_id.clone(),
                        Severity::High,
                        format!("workload not ready: {status}"),
                    )
                    .with_evidence_ref(e.id),
                );
            }
        }

        if e.payload["ready"] == false {
            issues.push(
                Issue::new(
                    e.check_id.clone(),
                    Severity::High,
                    "workload reports not ready",
                )
                .with_evidence_ref(e.id),
            );
        }

        if let Some(restarts) = e.payload["restarts"].as_u64() {
            if restarts > 0 {
                issues.push(
                    Issue::new(
                        e.check_id.clone(),
                        Severity::Medium,
                        "container restarts observed since deploy",
                    )
                    .with_evidence_ref(e.id),
                );
            }
        }
    }

    issues
}

/// Log scan ladder. Messages are deliberately generic so the aggregator
/// collapses repeated lines into one issue with all evidence attached.
fn classify_logs(evidence: &[Evidence]) -> Vec<Issue> {
    let mut issues = Vec::new();

    for e in evidence {
        if e.kind != EvidenceKind::LogLine {
            continue;
        }
        let level = e.payload["level"].as_str().unwrap_or("");
        let line = e.payload["line"].as_str().unwrap_or("");

        if level == "fatal" || line.contains("panic") {
            issues.push(
                Issue::new(
                    e.check_id.clone(),
                    Severity::Critical,
                    "panic or fatal entries in application logs",
                )
                .with_evidence_ref(e.id)
                .with_remediation("roll back and capture a full log dump for the crash window"),
            );
        } else if level == "error" {
            issues.push(
                Issue::new(
                    e.check_id.clone(),
                    Severity::High,
                    "error entries in application logs",
                )
                .with_evidence_ref(e.id),
            );
        } else if level == "warn" {
            issues.push(
                Issue::new(
                    e.check_id.clone(),
                    Severity::Low,
                    "warning entries in application logs",
                )
                .with_evidence_ref(e.id),
            );
        }
    }

    issues
}

const LATENCY_BUDGET_MS: u64 = 1_000;

/// Health endpoint ladder: 5xx is critical, 4xx is high, slow is advisory.
fn classify_endpoints(evidence: &[Evidence]) -> Vec<Issue> {
    let mut issues = Vec::new();

    for e in evidence {
        if e.kind != EvidenceKind::ProbeResponse {
            continue;
        }

        if let Some(status) = e.payload["status"].as_u64() {
            if status >= 500 {
                issues.push(
                    Issue::new(
                        e.check_id.clone(),
                        Severity::Critical,
                        "health endpoint returning server errors",
                    )
                    .with_evidence_ref(e.id)
                    .with_remediation("roll back; the service cannot serve its own health check"),
                );
            } else if status >= 400 {
                issues.push(
                    Issue::new(
                        e.check_id.clone(),
                        Severity::High,
                        "health endpoint returning client errors",
                    )
                    .with_evidence_ref(e.id),
                );
            }
        }

        if let Some(latency) = e.payload["latency_ms"].as_u64() {
            if latency > LATENCY_BUDGET_MS {
                issues.push(
                    Issue::new(
                        e.check_id.clone(),
                        Severity::Medium,
                        "health endpoint latency above budget",
                    )
                    .with_evidence_ref(e.id),
                );
            }
        }
    }

    issues
}

/// Resource pressure ladder over metric samples.
fn classify_resources(evidence: &[Evidence]) -> Vec<Issue> {
    let mut issues = Vec::new();

    for e in evidence {
        if e.kind != EvidenceKind::MetricSample {
            continue;
        }
        let resource = e.payload["resource"].as_str().unwrap_or("resource");

        if let Some(pct) = e.payload["utilization_pct"].as_f64() {
            if pct >= 95.0 {
                issues.push(
                    Issue::new(
                        e.check_id.clone(),
                        Severity::High,
                        format!("{resource} utilization at saturation"),
                    )
                    .with_evidence_ref(e.id)
                    .with_remediation("raise resource limits or scale out before traffic ramps"),
                );
            } else if pct >= 80.0 {
                issues.push(
                    Issue::new(
                        e.check_id.clone(),
                        Severity::Medium,
                        format!("{resource} utilization elevated"),
                    )
                    .with_evidence_ref(e.id),
                );
            }
        }
    }

    issues
}
