//! Read-only admin API: gateway health, target list, outcome counters.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::handlers::*;
use crate::proxy::Dispatcher;

pub fn setup_admin_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/targets", get(get_targets))
        .route("/stats", get(get_stats))
        .with_state(dispatcher)
}

/// Serve the admin API until shutdown.
pub async fn serve_admin(
    addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");

    axum::serve(listener, setup_admin_router(dispatcher))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
