//! Postflight - post-deployment validation CLI
//!
//! The `postflight` command runs a phase-driven validation against a
//! deployed target and exits with a machine-checkable code:
//!
//! - `0` — verdict is PASS
//! - `1` — verdict is FAIL
//! - `2` — configuration or startup error (nothing was validated)

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn, Level};

use postflight_adapters::{FixtureProbe, HttpHealthProbe};
use postflight_core::{
    ConfigError, Platform, ProbeAdapter, RunConfig, ValidationDepth, ValidationRun,
};
use postflight_engine::{plan_for, Orchestrator};

#[derive(Parser)]
#[command(name = "postflight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Strict post-deployment validation with pass/fail verdicts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a deployed target and exit 0 only if every check passes
    Validate {
        /// Deployment name, namespace/app identifier or base URL
        #[arg(short, long)]
        target: String,

        /// Platform the target runs on
        #[arg(short, long, value_enum)]
        platform: PlatformArg,

        /// How thorough the validation should be
        #[arg(short, long, value_enum, default_value = "standard")]
        depth: DepthArg,

        /// Skip remaining phases once a critical issue is found, instead
        /// of running them in evidence-only mode
        #[arg(long)]
        fail_fast: bool,

        /// Cap on concurrently executing checks within a phase
        #[arg(long)]
        workers: Option<usize>,

        /// Grace period for in-flight checks after cancellation, in ms
        #[arg(long, default_value_t = 2_000)]
        grace_ms: u64,

        /// Fixture file with recorded observations (platform = fixture)
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Write the full run snapshot as JSON to this path
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlatformArg {
    Docker,
    Kubernetes,
    Http,
    Fixture,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Docker => Platform::Docker,
            PlatformArg::Kubernetes => Platform::Kubernetes,
            PlatformArg::Http => Platform::Http,
            PlatformArg::Fixture => Platform::Fixture,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DepthArg {
    Basic,
    Standard,
    Comprehensive,
    Paranoid,
}

impl From<DepthArg> for ValidationDepth {
    fn from(arg: DepthArg) -> Self {
        match arg {
            DepthArg::Basic => ValidationDepth::Basic,
            DepthArg::Standard => ValidationDepth::Standard,
            DepthArg::Comprehensive => ValidationDepth::Comprehensive,
            DepthArg::Paranoid => ValidationDepth::Paranoid,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    postflight_core::init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Validate {
            target,
            platform,
            depth,
            fail_fast,
            workers,
            grace_ms,
            fixture,
            report,
        } => {
            cmd_validate(
                &target,
                platform.into(),
                depth.into(),
                fail_fast,
                workers,
                grace_ms,
                fixture.as_deref(),
                report.as_deref(),
            )
            .await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_validate(
    target: &str,
    platform: Platform,
    depth: ValidationDepth,
    fail_fast: bool,
    workers: Option<usize>,
    grace_ms: u64,
    fixture: Option<&Path>,
    report: Option<&Path>,
) -> Result<ExitCode> {
    let mut config = RunConfig::new(target, platform, depth);
    config.fail_fast = fail_fast;
    config.max_workers = workers;
    config.grace_period_ms = grace_ms;

    let adapter = build_adapter_registry(fixture)?
        .remove(&platform)
        .ok_or(ConfigError::UnknownPlatform {
            platform: platform.to_string(),
        })?;

    // Cooperative cancellation on Ctrl-C.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling validation run");
            let _ = cancel_tx.send(true);
        }
    });

    let run = Orchestrator::run(plan_for(depth), adapter, &config, cancel_rx)
        .await
        .context("validation run rejected")?;

    print_summary(&run);

    if let Some(path) = report {
        let snapshot =
            serde_json::to_string_pretty(&run).context("failed to serialize run snapshot")?;
        std::fs::write(path, snapshot)
            .with_context(|| format!("failed to write report to {path:?}"))?;
        info!(path = %path.display(), "run snapshot written");
    }

    let passed = run.verdict.as_ref().map(|v| v.passed()).unwrap_or(false);
    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Builtin probe adapters, keyed by platform. Docker and Kubernetes
/// require external adapters and are deliberately absent; selecting them
/// surfaces a configuration error before any phase runs.
fn build_adapter_registry(
    fixture: Option<&Path>,
) -> Result<HashMap<Platform, Arc<dyn ProbeAdapter>>> {
    let mut registry: HashMap<Platform, Arc<dyn ProbeAdapter>> = HashMap::new();
    registry.insert(Platform::Http, Arc::new(HttpHealthProbe::new()));

    if let Some(path) = fixture {
        let probe = FixtureProbe::from_path(path)
            .with_context(|| format!("failed to load fixture {path:?}"))?;
        registry.insert(Platform::Fixture, Arc::new(probe));
    }

    Ok(registry)
}

fn print_summary(run: &ValidationRun) {
    println!("Run:      {}", run.run_id);
    println!("Target:   {} ({})", run.target.name, run.target.platform);
    println!("Depth:    {}", run.depth);
    println!();

    for phase in &run.phase_results {
        let status = match phase.status {
            postflight_core::PhaseStatus::Complete => "complete",
            postflight_core::PhaseStatus::EvidenceOnly => "evidence-only",
            postflight_core::PhaseStatus::Incomplete => "incomplete",
            postflight_core::PhaseStatus::Skipped => "skipped",
        };
        println!(
            "  [{status:>13}] {} ({} check(s))",
            phase.phase_id,
            phase.check_results.len()
        );
    }
    println!();

    if run.aggregated_issues.is_empty() {
        println!("No issues found.");
    } else {
        println!("Issues ({}):", run.aggregated_issues.len());
        for issue in &run.aggregated_issues {
            println!("  {:>8}  {}  {}", issue.severity, issue.check_id, issue.message);
            if let Some(hint) = &issue.remediation_hint {
                println!("            remediation: {hint}");
            }
        }
    }
    println!();

    if let Some(verdict) = &run.verdict {
        let result = if verdict.passed() { "PASS" } else { "FAIL" };
        println!("Verdict:  {result} ({})", verdict.justification);
        println!("Rollback: {}", verdict.rollback);
    }
}
