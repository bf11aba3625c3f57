//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every target on the configured path
//! - Update target health state based on results
//! - Stop on shutdown
//!
//! # Design Decisions
//! - Targets are probed concurrently; one slow target does not delay the rest
//! - Probe bodies are read to the end so the connection goes back to the pool

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, Uri};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::http::headers::PROXIED_BY;
use crate::load_balancer::Target;
use crate::observability::metrics;
use crate::proxy::forwarder::{upstream_uri, HttpsClient};

pub struct HealthMonitor {
    targets: Vec<Arc<Target>>,
    config: HealthCheckConfig,
    client: HttpsClient,
}

impl HealthMonitor {
    pub fn new(targets: Vec<Arc<Target>>, config: HealthCheckConfig, client: HttpsClient) -> Self {
        Self {
            targets,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            targets = self.targets.len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every target once.
    pub async fn check_all(&self) {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let mut probes = JoinSet::new();

        for target in &self.targets {
            let target = target.clone();
            let client = self.client.clone();
            let path = self.config.path.clone();
            probes.spawn(async move {
                let healthy = probe(&client, &target, &path, timeout).await;
                (target, healthy)
            });
        }

        while let Some(joined) = probes.join_next().await {
            let (target, healthy) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "Health probe task failed");
                    continue;
                }
            };

            let changed = if healthy {
                target.mark_success(self.config.healthy_threshold as usize)
            } else {
                target.mark_failure(self.config.unhealthy_threshold as usize)
            };

            if changed {
                tracing::info!(
                    target = %target.label(),
                    state = ?target.health(),
                    "Target health changed"
                );
            }

            metrics::record_target_health(target.label(), target.is_healthy());
        }
    }
}

/// Upper bound on a probe body read before the connection is released.
const PROBE_BODY_LIMIT: usize = 64 * 1024;

async fn probe(client: &HttpsClient, target: &Target, path: &str, timeout: Duration) -> bool {
    let path: Uri = match path.parse() {
        Ok(path) => path,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Invalid health check path");
            return false;
        }
    };
    let uri = match upstream_uri(target.url(), &path) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(target = %target.label(), error = %e, "Failed to build health check URI");
            return false;
        }
    };

    let request = match Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::USER_AGENT, PROXIED_BY)
        .body(Body::empty())
    {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to build health check request: {}", e);
            return false;
        }
    };

    let exchange = async {
        let response = client.request(request).await?;
        let status = response.status();
        let _ = axum::body::to_bytes(Body::new(response.into_body()), PROBE_BODY_LIMIT).await;
        Ok::<_, hyper_util::client::legacy::Error>(status)
    };

    match time::timeout(timeout, exchange).await {
        Ok(Ok(status)) => {
            let success = status.is_success();
            if !success {
                tracing::warn!(target = %target.label(), status = %status, "Health check failed: non-success status");
            }
            success
        }
        Ok(Err(e)) => {
            tracing::warn!(target = %target.label(), error = %e, "Health check failed: connection error");
            false
        }
        Err(_) => {
            tracing::warn!(target = %target.label(), "Health check failed: timeout");
            false
        }
    }
}
