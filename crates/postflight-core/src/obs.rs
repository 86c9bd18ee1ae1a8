//! Structured observability hooks for the validation run lifecycle.
//!
//! Events are emitted at `info!` level (filter via the `POSTFLIGHT_LOG`
//! env var); the CLI can switch the subscriber to JSON line output.

use tracing::info;

/// RAII guard that enters a run-scoped tracing span for the duration of
/// a validation run.
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run id.
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("postflight.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Instrument a future with the run-scoped span.
///
/// Async-safe equivalent of [`RunSpan`]: an `EnteredSpan` guard must not
/// be held across `.await` points (it is `!Send`), so async run bodies
/// attach the span to the future instead.
pub fn instrument_run<F>(run_id: &str, fut: F) -> tracing::instrument::Instrumented<F>
where
    F: std::future::Future,
{
    use tracing::Instrument;
    fut.instrument(tracing::info_span!("postflight.run", run_id = %run_id))
}

/// Emit event: run started against a target.
pub fn emit_run_started(run_id: &str, target: &str, platform: &str, depth: &str) {
    info!(
        event = "run.started",
        run_id = %run_id,
        target = %target,
        platform = %platform,
        depth = %depth,
    );
}

/// Emit event: phase started.
pub fn emit_phase_started(run_id: &str, phase: &str, order: u32, checks: usize) {
    info!(event = "phase.started", run_id = %run_id, phase = %phase, order = order, checks = checks);
}

/// Emit event: phase finished with status and critical count.
pub fn emit_phase_finished(run_id: &str, phase: &str, status: &str, criticals: usize) {
    info!(
        event = "phase.finished",
        run_id = %run_id,
        phase = %phase,
        status = %status,
        criticals = criticals,
    );
}

/// Emit event: probe attempt failed, check will retry.
pub fn emit_check_retry(check: &str, attempt: u32, delay_ms: u64, reason: &str) {
    info!(
        event = "check.retry",
        check = %check,
        attempt = attempt,
        delay_ms = delay_ms,
        reason = %reason,
    );
}

/// Emit event: check finished.
pub fn emit_check_finished(check: &str, status: &str, attempts: u32, issues: usize) {
    info!(
        event = "check.finished",
        check = %check,
        status = %status,
        attempts = attempts,
        issues = issues,
    );
}

/// Emit event: cancellation requested (warning level).
pub fn emit_run_cancelled(run_id: &str, phase: &str) {
    tracing::warn!(event = "run.cancelled", run_id = %run_id, phase = %phase);
}

/// Emit event: verdict decided.
pub fn emit_verdict_decided(run_id: &str, result: &str, rollback: &str, issues: usize) {
    info!(
        event = "verdict.decided",
        run_id = %run_id,
        result = %result,
        rollback = %rollback,
        issues = issues,
    );
}

/// Emit event: run finished with duration and outcome.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, passed: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        passed = passed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        // Just ensure RunSpan::enter doesn't panic
        let _span = RunSpan::enter("test-run-id");
    }
}
