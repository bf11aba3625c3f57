//! Target pool construction.
//!
//! # Responsibilities
//! - Turn target configuration into an ordered, fixed-size pool
//! - Drop disabled targets, reject unusable URLs
//! - Build each target's forwarding handle exactly once

use std::ops::Index;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::validation::check_target_url;
use crate::config::{TargetConfig, TransportConfig};
use crate::load_balancer::target::{Target, TargetDescriptor};
use crate::proxy::forwarder::{Forward, HttpForwarder, HttpsClient};

/// Error type for pool construction. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("invalid target URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no enabled targets configured")]
    Empty,

    #[error("failed to build upstream client: {0}")]
    Client(String),
}

/// Ordered, immutable set of enabled targets.
#[derive(Debug, Clone)]
pub struct TargetPool {
    targets: Vec<Arc<Target>>,
}

impl TargetPool {
    /// Build the pool with HTTP(S) forwarders sharing `client`'s connection pool.
    pub fn from_config(
        configs: &[TargetConfig],
        transport: &TransportConfig,
        client: &HttpsClient,
    ) -> Result<Self, PoolError> {
        let default_timeout = Duration::from_millis(transport.response_header_timeout_ms);
        Self::from_config_with(configs, default_timeout, |url| {
            Arc::new(HttpForwarder::new(client.clone(), url.clone()))
        })
    }

    /// Build the pool with a caller-supplied forwarder factory.
    pub fn from_config_with<F>(
        configs: &[TargetConfig],
        default_timeout: Duration,
        mut make_forwarder: F,
    ) -> Result<Self, PoolError>
    where
        F: FnMut(&Url) -> Arc<dyn Forward>,
    {
        let mut targets = Vec::with_capacity(configs.len());

        for config in configs {
            if !config.enabled {
                tracing::debug!(url = %config.url, "Skipping disabled target");
                continue;
            }

            let url = check_target_url(&config.url).map_err(|reason| PoolError::InvalidUrl {
                url: config.url.clone(),
                reason,
            })?;

            let descriptor = TargetDescriptor {
                url,
                name: config.name.clone(),
                weight: config.weight,
                tags: config.tags.clone(),
                max_connections: config.max_connections,
                timeout: config
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(default_timeout),
            };
            let forwarder = make_forwarder(&descriptor.url);
            targets.push(Arc::new(Target::new(descriptor, forwarder)));
        }

        if targets.is_empty() {
            return Err(PoolError::Empty);
        }

        tracing::info!(targets = targets.len(), "Target pool built");
        Ok(Self { targets })
    }

    /// Pool from already-built targets.
    pub fn from_targets(targets: Vec<Arc<Target>>) -> Result<Self, PoolError> {
        if targets.is_empty() {
            return Err(PoolError::Empty);
        }
        Ok(Self { targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Always false for a constructed pool.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }
}

impl Index<usize> for TargetPool {
    type Output = Arc<Target>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.targets[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::forwarder::testing::ScriptedForwarder;

    fn build(configs: &[TargetConfig]) -> Result<TargetPool, PoolError> {
        TargetPool::from_config_with(configs, Duration::from_secs(30), |_| {
            Arc::new(ScriptedForwarder::always_ok())
        })
    }

    #[test]
    fn zero_enabled_targets_fails() {
        let mut disabled = TargetConfig::new("http://10.0.0.1:3000");
        disabled.enabled = false;

        assert_eq!(build(&[]).unwrap_err(), PoolError::Empty);
        assert_eq!(build(&[disabled]).unwrap_err(), PoolError::Empty);
    }

    #[test]
    fn disabled_targets_are_excluded() {
        let mut disabled = TargetConfig::new("http://10.0.0.1:3000");
        disabled.enabled = false;
        let enabled = TargetConfig::new("http://10.0.0.2:3000");

        let pool = build(&[disabled, enabled]).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].authority(), "10.0.0.2:3000");
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = build(&[TargetConfig::new("ftp://10.0.0.1")]).unwrap_err();
        assert!(matches!(err, PoolError::InvalidUrl { .. }));
    }

    #[test]
    fn disabled_entries_are_not_parsed() {
        let mut broken = TargetConfig::new("not a url");
        broken.enabled = false;
        let pool = build(&[broken, TargetConfig::new("http://10.0.0.3")]).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn keeps_order_and_metadata() {
        let mut a = TargetConfig::new("http://a.internal:1");
        a.weight = 0;
        a.name = Some("a".into());
        a.timeout_ms = Some(250);
        let b = TargetConfig::new("https://b.internal");

        let pool = build(&[a, b]).unwrap();
        assert_eq!(pool[0].label(), "a");
        assert_eq!(pool[0].weight(), 0);
        assert_eq!(pool[0].timeout(), Duration::from_millis(250));
        assert_eq!(pool[1].label(), "b.internal");
        assert_eq!(pool[1].timeout(), Duration::from_secs(30));
    }
}
