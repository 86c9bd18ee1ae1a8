//! Postflight Core - domain model for post-deployment validation
//!
//! Provides the building blocks the validation engine runs on:
//! - Evidence, Issue, Check and Phase records
//! - The `ProbeAdapter` contract that platform probes implement
//! - Issue aggregation with deterministic ordering
//! - The strict-fail verdict rule set

pub mod adapter;
pub mod aggregate;
pub mod check;
pub mod config;
pub mod error;
pub mod evidence;
pub mod issue;
pub mod obs;
pub mod run;
pub mod telemetry;
pub mod verdict;

// Re-export key types
pub use adapter::{ProbeAdapter, ProbeCtx};
pub use aggregate::aggregate;
pub use check::{Check, CheckId, Classifier, Phase, PhaseId, RetryPolicy};
pub use config::{Platform, PhaseOverride, RunConfig, ValidationDepth};
pub use error::{AdapterError, ConfigError};
pub use evidence::{Evidence, EvidenceId, EvidenceKind};
pub use issue::{Issue, IssueId, Severity};
pub use run::{
    CheckResult, CheckStatus, PhaseResult, PhaseStatus, RunCompleteness, RunId, TargetDescriptor,
    ValidationRun,
};
pub use telemetry::init_tracing;
pub use verdict::{decide, RollbackAdvice, Verdict, VerdictResult};
