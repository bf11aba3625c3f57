//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from configuration
//! - Log classified gateway errors at a level matching their severity
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, text format for development
//! - `RUST_LOG` overrides the configured level when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::{GatewayError, Severity};

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    let level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("velocity_gateway={level},tower_http={level}"))
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}

/// Emit one event for a gateway error. Severity picks the level.
pub fn log_gateway_error(error: &GatewayError) {
    let code = error.kind().code();
    let status = error.status().as_u16();
    let severity = error.severity();
    let cause = error.cause().map(|c| c.to_string());
    let last_target = error.context("last_target").and_then(|v| v.as_str());
    let request_id = error.context("request_id").and_then(|v| v.as_str());

    macro_rules! emit {
        ($level:ident) => {
            tracing::$level!(
                code,
                status,
                severity = %severity,
                request_id,
                last_target,
                cause = cause.as_deref(),
                "{}",
                error.message()
            )
        };
    }

    match severity {
        Severity::Debug => emit!(debug),
        Severity::Info => emit!(info),
        Severity::Warn => emit!(warn),
        Severity::Error | Severity::Critical | Severity::Fatal => emit!(error),
    }
}
