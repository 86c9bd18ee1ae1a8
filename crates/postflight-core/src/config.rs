//! Run configuration and startup validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::check::{Phase, PhaseId};
use crate::error::ConfigError;

/// Platform the target runs on; selects which probe adapter gathers
/// evidence. The orchestration logic itself never branches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Docker,
    Kubernetes,
    Http,
    Fixture,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Platform::Docker => "docker",
            Platform::Kubernetes => "kubernetes",
            Platform::Http => "http",
            Platform::Fixture => "fixture",
        };
        f.write_str(s)
    }
}

/// How thorough a validation run should be. Deeper levels add phases and
/// raise retry budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationDepth {
    Basic,
    Standard,
    Comprehensive,
    Paranoid,
}

impl std::fmt::Display for ValidationDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidationDepth::Basic => "basic",
            ValidationDepth::Standard => "standard",
            ValidationDepth::Comprehensive => "comprehensive",
            ValidationDepth::Paranoid => "paranoid",
        };
        f.write_str(s)
    }
}

/// Per-phase configuration override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseOverride {
    /// Phase this override applies to; must exist in the plan.
    pub phase_id: PhaseId,

    /// Replacement critical-halt threshold.
    #[serde(default)]
    pub halt_on_critical_count: Option<u32>,

    /// Set to false to drop the phase from the run entirely.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Configuration for one validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Deployment name, namespace/app identifier or base URL.
    pub target: String,

    /// Platform of the target.
    pub platform: Platform,

    /// Validation depth.
    pub depth: ValidationDepth,

    /// When true, a tripped critical threshold skips the remaining phases
    /// instead of running them in evidence-only mode.
    #[serde(default)]
    pub fail_fast: bool,

    /// Cap on concurrently executing checks within a phase. `None` uses
    /// the number of CPU-visible workers.
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// How long in-flight checks may keep running after cancellation.
    #[serde(default = "default_grace_ms")]
    pub grace_period_ms: u64,

    /// Per-phase overrides.
    #[serde(default)]
    pub phase_overrides: Vec<PhaseOverride>,
}

fn default_grace_ms() -> u64 {
    2_000
}

impl RunConfig {
    /// Configuration with defaults for the given target.
    pub fn new(target: impl Into<String>, platform: Platform, depth: ValidationDepth) -> Self {
        Self {
            target: target.into(),
            platform,
            depth,
            fail_fast: false,
            max_workers: None,
            grace_period_ms: default_grace_ms(),
            phase_overrides: Vec::new(),
        }
    }

    /// Validate a plan against this configuration and apply overrides.
    ///
    /// Returns the effective phase list, sorted by `order`, with disabled
    /// phases removed and threshold overrides applied. Any structural
    /// problem aborts the run before a single phase executes.
    pub fn effective_plan(&self, plan: Vec<Phase>) -> Result<Vec<Phase>, ConfigError> {
        if plan.is_empty() {
            return Err(ConfigError::EmptyPlan);
        }

        let mut by_order: BTreeMap<u32, &Phase> = BTreeMap::new();
        let mut phase_ids = std::collections::BTreeSet::new();
        let mut check_ids = std::collections::BTreeSet::new();
        for phase in &plan {
            if let Some(existing) = by_order.insert(phase.order, phase) {
                return Err(ConfigError::DuplicatePhaseOrder {
                    order: phase.order,
                    first: existing.id.clone(),
                    second: phase.id.clone(),
                });
            }
            if !phase_ids.insert(phase.id.clone()) {
                return Err(ConfigError::DuplicatePhaseId {
                    phase: phase.id.clone(),
                });
            }
            if phase.checks.is_empty() {
                return Err(ConfigError::EmptyPhase {
                    phase: phase.id.clone(),
                });
            }
            for check in &phase.checks {
                if check.phase_id != phase.id {
                    return Err(ConfigError::CheckPhaseMismatch {
                        check: check.id.clone(),
                        declared: check.phase_id.clone(),
                        actual: phase.id.clone(),
                    });
                }
                if !check_ids.insert(check.id.clone()) {
                    return Err(ConfigError::DuplicateCheckId {
                        check: check.id.clone(),
                    });
                }
                if check.retry.max_attempts == 0 {
                    return Err(ConfigError::ZeroAttempts {
                        check: check.id.clone(),
                    });
                }
            }
        }

        for or in &self.phase_overrides {
            if !phase_ids.contains(&or.phase_id) {
                return Err(ConfigError::UnknownPhaseOverride {
                    phase: or.phase_id.clone(),
                });
            }
        }

        let mut effective: Vec<Phase> = plan;
        effective.sort_by_key(|p| p.order);
        effective.retain(|p| {
            self.phase_overrides
                .iter()
                .find(|o| o.phase_id == p.id)
                .map(|o| o.enabled)
                .unwrap_or(true)
        });
        for phase in &mut effective {
            if let Some(or) = self
                .phase_overrides
                .iter()
                .find(|o| o.phase_id == phase.id)
            {
                if or.halt_on_critical_count.is_some() {
                    phase.halt_on_critical_count = or.halt_on_critical_count;
                }
            }
        }

        if effective.is_empty() {
            return Err(ConfigError::EmptyPlan);
        }

        Ok(effective)
    }
}
