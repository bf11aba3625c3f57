//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Initialize subsystems in dependency order
//! - Start background tasks (metrics, admin API, health checks)
//! - Bind the proxy listener and serve until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and logged at fatal severity
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::serve_admin;
use crate::config::{validate_config, GatewayConfig};
use crate::errors::{ErrorKind, GatewayError};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{log_gateway_error, metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] GatewayError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

fn config_error(message: &str, details: Vec<String>) -> StartupError {
    let error = GatewayError::new(ErrorKind::Configuration, message).with_context("errors", details);
    log_gateway_error(&error);
    StartupError::Config(error)
}

/// Run the gateway until SIGINT/SIGTERM.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if let Err(errors) = validate_config(&config) {
        return Err(config_error(
            "Invalid configuration",
            errors.iter().map(ToString::to_string).collect(),
        ));
    }

    if config.metrics.enabled {
        match config.metrics.bind_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.metrics.bind_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let admin = config.admin.clone();
    let address = config.server.bind_address();

    let server = HttpServer::new(config)
        .map_err(|e| config_error("Failed to build target pool", vec![e.to_string()]))?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();

    if admin.enabled {
        match admin.bind_address.parse::<SocketAddr>() {
            Ok(addr) => {
                let dispatcher = server.dispatcher();
                let rx = shutdown.subscribe();
                tokio::spawn(async move {
                    if let Err(e) = serve_admin(addr, dispatcher, rx).await {
                        tracing::error!(address = %addr, error = %e, "Admin API failed");
                    }
                });
            }
            Err(e) => tracing::error!(
                admin_address = %admin.bind_address,
                error = %e,
                "Failed to parse admin address"
            ),
        }
    }

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
