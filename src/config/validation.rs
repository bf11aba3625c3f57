//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the target list can produce a non-empty pool
//! - Validate value ranges (timeouts > 0, weights, thresholds)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, HealthCheckConfig, TargetConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server host is required")]
    MissingHost,

    #[error("server port must be between 1 and 65535")]
    InvalidPort,

    #[error("server request_timeout_secs must be at least 1")]
    InvalidRequestTimeout,

    #[error("at least one target must be configured")]
    NoTargets,

    #[error("at least one target must be enabled")]
    NoEnabledTargets,

    #[error("target {index}: invalid URL '{url}': {reason}")]
    InvalidTargetUrl {
        index: usize,
        url: String,
        reason: String,
    },

    #[error("target {index}: weight must be between 0 and 100 (got {weight})")]
    InvalidWeight { index: usize, weight: u32 },

    #[error("target {index}: max_connections must be at least 1")]
    InvalidMaxConnections { index: usize },

    #[error("target {index}: timeout_ms must be at least 1")]
    InvalidTargetTimeout { index: usize },

    #[error("health check timeout ({timeout_secs}s) must be less than interval ({interval_secs}s)")]
    HealthCheckTimeout { timeout_secs: u64, interval_secs: u64 },

    #[error("health check unhealthy threshold must be at least 1")]
    UnhealthyThreshold,

    #[error("health check healthy threshold must be at least 1")]
    HealthyThreshold,

    #[error("health check path must start with '/'")]
    HealthCheckPath,

    #[error("{section} bind address '{address}' is not a valid socket address")]
    InvalidBindAddress {
        section: &'static str,
        address: String,
    },
}

/// Validate a whole configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::MissingHost);
    }
    if config.server.port == 0 {
        errors.push(ValidationError::InvalidPort);
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::InvalidRequestTimeout);
    }

    if config.targets.is_empty() {
        errors.push(ValidationError::NoTargets);
    } else if !config.targets.iter().any(|t| t.enabled) {
        errors.push(ValidationError::NoEnabledTargets);
    }

    // Disabled entries never reach the pool, so they are not checked.
    for (index, target) in config.targets.iter().enumerate().filter(|(_, t)| t.enabled) {
        errors.extend(validate_target(index, target));
    }

    errors.extend(validate_health_check(&config.health_check));

    if config.metrics.enabled && config.metrics.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            section: "metrics",
            address: config.metrics.bind_address.clone(),
        });
    }
    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            section: "admin",
            address: config.admin.bind_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one target entry.
pub fn validate_target(index: usize, target: &TargetConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(reason) = check_target_url(&target.url) {
        errors.push(ValidationError::InvalidTargetUrl {
            index,
            url: target.url.clone(),
            reason,
        });
    }
    if target.weight > 100 {
        errors.push(ValidationError::InvalidWeight {
            index,
            weight: target.weight,
        });
    }
    if target.max_connections == Some(0) {
        errors.push(ValidationError::InvalidMaxConnections { index });
    }
    if target.timeout_ms == Some(0) {
        errors.push(ValidationError::InvalidTargetTimeout { index });
    }

    errors
}

/// Scheme and host check shared with pool construction.
pub fn check_target_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(format!(
                "URL scheme must be http or https (got '{}')",
                other
            ))
        }
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("URL must include a host".to_string());
    }
    Ok(url)
}

fn validate_health_check(config: &HealthCheckConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if !config.enabled {
        return errors;
    }

    if config.timeout_secs >= config.interval_secs {
        errors.push(ValidationError::HealthCheckTimeout {
            timeout_secs: config.timeout_secs,
            interval_secs: config.interval_secs,
        });
    }
    if config.unhealthy_threshold == 0 {
        errors.push(ValidationError::UnhealthyThreshold);
    }
    if config.healthy_threshold == 0 {
        errors.push(ValidationError::HealthyThreshold);
    }
    if !config.path.starts_with('/') {
        errors.push(ValidationError::HealthCheckPath);
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GatewayConfig {
        GatewayConfig::with_default_target()
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn rejects_empty_host_and_zero_port() {
        let mut config = valid();
        config.server.host = String::new();
        config.server.port = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingHost));
        assert!(errors.contains(&ValidationError::InvalidPort));
    }

    #[test]
    fn rejects_missing_targets() {
        let mut config = valid();
        config.targets.clear();
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoTargets]));
    }

    #[test]
    fn rejects_all_disabled_targets() {
        let mut config = valid();
        config.targets[0].enabled = false;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::NoEnabledTargets])
        );
    }

    #[test]
    fn disabled_targets_are_not_validated() {
        let mut config = valid();
        let mut broken = TargetConfig::new("not a url");
        broken.enabled = false;
        broken.weight = 500;
        config.targets.insert(0, broken);
        assert_eq!(validate_config(&config), Ok(()));

        config.targets[0].enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ValidationError::InvalidTargetUrl { index: 0, .. }));
    }

    #[test]
    fn rejects_zero_request_timeout() {
        let mut config = valid();
        config.server.request_timeout_secs = 0;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::InvalidRequestTimeout])
        );
    }

    #[test]
    fn rejects_bad_target_fields() {
        let mut target = TargetConfig::new("ftp://example.com");
        target.weight = 150;
        target.max_connections = Some(0);

        let errors = validate_target(2, &target);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].to_string().contains("URL scheme must be http or https"));
        assert_eq!(errors[1], ValidationError::InvalidWeight { index: 2, weight: 150 });
        assert_eq!(errors[2], ValidationError::InvalidMaxConnections { index: 2 });
    }

    #[test]
    fn accepts_http_and_https_targets() {
        assert!(validate_target(0, &TargetConfig::new("http://example.com:8080")).is_empty());
        assert!(validate_target(0, &TargetConfig::new("https://example.com")).is_empty());
        assert!(!validate_target(0, &TargetConfig::new("not-a-url")).is_empty());
    }

    #[test]
    fn health_check_rules_only_apply_when_enabled() {
        let mut config = valid();
        config.health_check.timeout_secs = 60;
        config.health_check.unhealthy_threshold = 0;
        assert!(validate_config(&config).is_ok());

        config.health_check.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::UnhealthyThreshold));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::HealthCheckTimeout { .. })));
    }

    #[test]
    fn rejects_unparseable_admin_address() {
        let mut config = valid();
        config.admin.bind_address = "localhost".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors[0],
            ValidationError::InvalidBindAddress { section: "admin", .. }
        ));
    }
}
