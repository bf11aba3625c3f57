//! Configuration loading from disk and environment.
//!
//! Precedence, highest first: `VELOCITY_*` environment variables, the TOML
//! file, built-in defaults.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{Algorithm, GatewayConfig, LogFormat, LogLevel};
use crate::config::validation::{validate_config, ValidationError};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "VELOCITY_";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {var} value '{value}': {reason}")]
    Env {
        var: String,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Defaults plus environment overrides, validated.
pub fn load_default() -> Result<GatewayConfig, ConfigError> {
    finish(GatewayConfig::with_default_target(), |key| std::env::var(key).ok())
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Defaults,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::File => "file",
            ConfigSource::Defaults => "defaults",
        }
    }
}

/// [`load_config`], or [`load_default`] when the file does not exist.
/// Any other read failure is an error.
pub fn load_config_or_default(path: &Path) -> Result<(GatewayConfig, ConfigSource), ConfigError> {
    load_or_default_with_env(path, |key| std::env::var(key).ok())
}

/// [`load_config_or_default`] with an injectable environment lookup.
pub fn load_or_default_with_env<F>(
    path: &Path,
    env: F,
) -> Result<(GatewayConfig, ConfigSource), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match load_config_with_env(path, &env) {
        Ok(config) => Ok((config, ConfigSource::File)),
        Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            let config = finish(GatewayConfig::with_default_target(), env)?;
            Ok((config, ConfigSource::Defaults))
        }
        Err(e) => Err(e),
    }
}

/// [`load_config`] with an injectable environment lookup.
pub fn load_config_with_env<F>(path: &Path, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse_config(&content)?;
    finish(config, env)
}

/// Parse TOML text. An absent `targets` list keeps the built-in default target.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = toml::from_str(content)?;
    let declares_targets = content
        .parse::<toml::Table>()
        .map(|table| table.contains_key("targets"))
        .unwrap_or(false);
    if !declares_targets {
        config.targets = GatewayConfig::with_default_target().targets;
    }
    Ok(config)
}

fn finish<F>(mut config: GatewayConfig, env: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, env)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `VELOCITY_*` overrides onto `config`.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| {
        let var = format!("{}{}", ENV_PREFIX, name);
        env(&var).filter(|v| !v.is_empty()).map(|value| (var, value))
    };
    let invalid = |var: String, value: String, reason: String| ConfigError::Env { var, value, reason };

    if let Some((_, host)) = lookup("SERVER_HOST") {
        config.server.host = host;
    }

    if let Some((var, value)) = lookup("SERVER_PORT") {
        config.server.port = value
            .parse()
            .map_err(|_| invalid(var, value.clone(), "must be an integer port".into()))?;
    }

    if let Some((var, value)) = lookup("LOGGING_LEVEL") {
        config.logging.level = value
            .parse::<LogLevel>()
            .map_err(|reason| invalid(var, value.clone(), reason))?;
    }

    if let Some((var, value)) = lookup("LOGGING_FORMAT") {
        config.logging.format = value
            .parse::<LogFormat>()
            .map_err(|reason| invalid(var, value.clone(), reason))?;
    }

    if let Some((var, value)) = lookup("HEALTH_CHECK_ENABLED") {
        config.health_check.enabled = match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => return Err(invalid(var, value, "must be true/false".into())),
        };
    }

    if let Some((var, value)) = lookup("LOAD_BALANCING_ALGORITHM") {
        config.load_balancing.algorithm = value
            .parse::<Algorithm>()
            .map_err(|reason| invalid(var, value.clone(), reason))?;
    }

    Ok(())
}
