//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Proxy listener settings.
    pub server: ServerConfig,

    /// Backend targets, in pool order.
    pub targets: Vec<TargetConfig>,

    /// Target selection and failover policy.
    pub load_balancing: LoadBalancingConfig,

    /// Upstream transport tuning.
    pub transport: TransportConfig,

    /// Active health check settings.
    pub health_check: HealthCheckConfig,

    /// Log level and output format.
    pub logging: LoggingConfig,

    /// Prometheus exporter settings.
    pub metrics: MetricsConfig,

    /// Admin (stats) listener settings.
    pub admin: AdminConfig,
}

/// Proxy listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind to ("0.0.0.0" for all interfaces).
    pub host: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Upper bound on the whole request/response exchange, in seconds.
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 60,
        }
    }
}

/// A single backend target.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Full backend URL, e.g. "http://backend1:3000".
    pub url: String,

    /// Disabled targets are dropped when the pool is built.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Relative traffic share (0-100) for weighted selection.
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Human-readable label.
    #[serde(default)]
    pub name: Option<String>,

    /// Free-form metadata.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Cap on concurrent in-flight attempts to this target.
    #[serde(default)]
    pub max_connections: Option<usize>,

    /// Response-header timeout override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl TargetConfig {
    /// Enabled target with default metadata.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            enabled: true,
            weight: default_weight(),
            name: None,
            tags: BTreeMap::new(),
            max_connections: None,
            timeout_ms: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

/// Start-index selection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_robin" => Ok(Algorithm::RoundRobin),
            "weighted_round_robin" => Ok(Algorithm::WeightedRoundRobin),
            other => Err(format!(
                "unsupported load balancing algorithm '{}': must be round_robin or weighted_round_robin",
                other
            )),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::RoundRobin => f.write_str("round_robin"),
            Algorithm::WeightedRoundRobin => f.write_str("weighted_round_robin"),
        }
    }
}

/// Load balancing and failover policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancingConfig {
    /// How the first target of each request is picked.
    pub algorithm: Algorithm,

    /// Allow failover for methods that are not idempotent (POST, PATCH).
    ///
    /// Failover only ever happens before any body bytes reached a target,
    /// but the backend may still have acted on the request headers.
    pub retry_non_idempotent: bool,
}

impl Default for LoadBalancingConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::RoundRobin,
            retry_non_idempotent: true,
        }
    }
}

/// Upstream HTTP client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Time allowed for a target to produce response headers.
    pub response_header_timeout_ms: u64,

    /// TCP connect timeout.
    pub connect_timeout_ms: u64,

    /// How long idle pooled connections are kept.
    pub pool_idle_timeout_secs: u64,

    /// Idle pooled connections kept per target host.
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            response_header_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 10,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe on each target.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 30,
            timeout_secs: 5,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Minimum log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!(
                "invalid log level '{}': must be debug, info, warn, or error",
                s
            )),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("invalid log format '{}': must be text or json", s)),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve a Prometheus scrape endpoint.
    pub enabled: bool,

    /// Scrape endpoint bind address.
    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve /health, /targets and /stats.
    pub enabled: bool,

    /// Admin listener bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Built-in configuration: one local target on port 3000.
    pub fn with_default_target() -> Self {
        Self {
            targets: vec![TargetConfig::new("http://localhost:3000")],
            ..Self::default()
        }
    }
}
