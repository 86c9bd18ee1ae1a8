//! HTTP health endpoint probe.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use postflight_core::{
    AdapterError, CheckId, Evidence, EvidenceKind, ProbeAdapter, ProbeCtx, TargetDescriptor,
};

const DEFAULT_PATH: &str = "/health";
const BODY_SNIPPET_LEN: usize = 256;

/// Probes HTTP endpoints on the target and records one `ProbeResponse`
/// evidence per call: status code, latency and a body snippet.
///
/// The target descriptor's `name` is the base URL. Network-level failures
/// are transient (the executor retries them); a base URL that cannot be
/// parsed is fatal.
pub struct HttpHealthProbe {
    client: reqwest::Client,
    paths: HashMap<CheckId, String>,
}

impl HttpHealthProbe {
    /// Probe `/health` for every check.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            paths: HashMap::new(),
        }
    }

    /// Route a specific check to a different path. Chainable.
    pub fn with_path(mut self, check_id: &str, path: impl Into<String>) -> Self {
        self.paths.insert(CheckId::from(check_id), path.into());
        self
    }

    fn path_for(&self, check_id: &CheckId) -> &str {
        self.paths
            .get(check_id)
            .map(String::as_str)
            .unwrap_or(DEFAULT_PATH)
    }
}

impl Default for HttpHealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeAdapter for HttpHealthProbe {
    fn source(&self) -> &str {
        "http"
    }

    async fn probe(
        &self,
        check_id: &CheckId,
        target: &TargetDescriptor,
        _ctx: &ProbeCtx,
    ) -> Result<Vec<Evidence>, AdapterError> {
        let url = format!(
            "{}{}",
            target.name.trim_end_matches('/'),
            self.path_for(check_id)
        );
        let parsed: reqwest::Url = url
            .parse()
            .map_err(|e| AdapterError::fatal(format!("invalid target URL '{url}': {e}")))?;

        debug!(check = %check_id, url = %parsed, "probing HTTP endpoint");

        let started = Instant::now();
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| AdapterError::transient(format!("request to '{url}' failed: {e}")))?;

        let status = response.status().as_u16();
        let latency_ms = started.elapsed().as_millis() as u64;
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(BODY_SNIPPET_LEN).collect();

        Ok(vec![Evidence::new(
            check_id.clone(),
            EvidenceKind::ProbeResponse,
            json!({
                "reachable": true,
                "status": status,
                "latency_ms": latency_ms,
                "body": snippet,
            }),
            self.source(),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postflight_core::Platform;

    fn target(name: &str) -> TargetDescriptor {
        TargetDescriptor {
            name: name.to_string(),
            platform: Platform::Http,
        }
    }

    #[test]
    fn test_path_routing() {
        let probe = HttpHealthProbe::new().with_path("readiness", "/ready");
        assert_eq!(probe.path_for(&CheckId::from("readiness")), "/ready");
        assert_eq!(probe.path_for(&CheckId::from("liveness")), "/health");
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_fatal() {
        let probe = HttpHealthProbe::new();
        let err = probe
            .probe(
                &CheckId::from("health_endpoint"),
                &target("not a url"),
                &ProbeCtx::never_cancelled(),
            )
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        // Port 1 is never listening on loopback.
        let probe = HttpHealthProbe::new();
        let err = probe
            .probe(
                &CheckId::from("health_endpoint"),
                &target("http://127.0.0.1:1"),
                &ProbeCtx::never_cancelled(),
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
