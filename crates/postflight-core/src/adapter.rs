//! Probe adapter contract.
//!
//! Platform-specific probes live outside the core; the engine depends only
//! on this trait. Adapters must be safe for concurrent invocation against
//! the same target and must hold no run-level state.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::check::CheckId;
use crate::error::AdapterError;
use crate::evidence::Evidence;
use crate::run::TargetDescriptor;

/// Cooperative cancellation handle passed to every probe invocation.
///
/// Adapters should poll [`ProbeCtx::is_cancelled`] or await
/// [`ProbeCtx::cancelled`] around long waits and return promptly once the
/// run is being torn down. Probes that ignore cancellation are only
/// protected by the executor's hard per-attempt timeout.
#[derive(Debug, Clone)]
pub struct ProbeCtx {
    cancel: watch::Receiver<bool>,
    // Keeps the channel open for contexts that own their sender.
    _keepalive: Option<std::sync::Arc<watch::Sender<bool>>>,
}

impl ProbeCtx {
    /// Wrap an existing cancellation channel.
    pub fn new(cancel: watch::Receiver<bool>) -> Self {
        Self {
            cancel,
            _keepalive: None,
        }
    }

    /// A context that can never be cancelled, for tests and one-shot use.
    pub fn never_cancelled() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            cancel: rx,
            _keepalive: Some(std::sync::Arc::new(tx)),
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolve once cancellation is requested. Never resolves if the
    /// sender is dropped without signalling.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without signalling: cancellation can no
                // longer happen.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// A platform-specific evidence gatherer.
#[async_trait]
pub trait ProbeAdapter: Send + Sync {
    /// Stable identifier recorded as `Evidence::source`.
    fn source(&self) -> &str;

    /// Gather evidence for one check against the target.
    ///
    /// Returns [`AdapterError::Transient`] for failures worth retrying
    /// (network blips, flaky endpoints) and [`AdapterError::Fatal`] for
    /// failures that cannot succeed on retry (misconfiguration, missing
    /// credentials).
    async fn probe(
        &self,
        check_id: &CheckId,
        target: &TargetDescriptor,
        ctx: &ProbeCtx,
    ) -> Result<Vec<Evidence>, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_never_cancelled_ctx() {
        let ctx = ProbeCtx::never_cancelled();
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_signal_observed() {
        let (tx, rx) = watch::channel(false);
        let ctx = ProbeCtx::new(rx);
        assert!(!ctx.is_cancelled());

        tx.send(true).unwrap();
        assert!(ctx.is_cancelled());
        // Must resolve immediately once the flag is set.
        ctx.cancelled().await;
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let (tx, rx) = watch::channel(false);
        let ctx = ProbeCtx::new(rx);

        let waiter = tokio::spawn(async move { ctx.cancelled().await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }
}
