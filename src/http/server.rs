//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener with graceful shutdown
//! - Spawn the active health monitor when enabled

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, Request},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::health::HealthMonitor;
use crate::http::headers::X_REQUEST_ID;
use crate::load_balancer::{PoolError, TargetPool};
use crate::proxy::forwarder::{build_client, HttpsClient};
use crate::proxy::Dispatcher;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    dispatcher: Arc<Dispatcher>,
    client: Option<HttpsClient>,
}

impl HttpServer {
    /// Build the upstream client, target pool and dispatcher from configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, PoolError> {
        let client = build_client(&config.transport).map_err(|e| PoolError::Client(e.to_string()))?;
        let pool = TargetPool::from_config(&config.targets, &config.transport, &client)?;
        let dispatcher = Arc::new(
            Dispatcher::new(pool, &config.load_balancing)
                .with_request_timeout(Duration::from_secs(config.server.request_timeout_secs)),
        );

        let mut server = Self::with_dispatcher(config, dispatcher);
        server.client = Some(client);
        Ok(server)
    }

    /// Use an already-built dispatcher.
    pub fn with_dispatcher(config: GatewayConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let state = AppState {
            dispatcher: dispatcher.clone(),
        };
        Self {
            router: Self::build_router(state),
            config,
            dispatcher,
            client: None,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The whole-request deadline is enforced by the dispatcher, so a
    /// request that runs out of time still gets a classified error.
    fn build_router(state: AppState) -> Router {
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for in-process serving and tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            targets = self.dispatcher.pool().len(),
            algorithm = %self.config.load_balancing.algorithm,
            "HTTP server starting"
        );

        if self.config.health_check.enabled {
            let client = match self.client {
                Some(client) => client,
                None => build_client(&self.config.transport).map_err(std::io::Error::other)?,
            };
            let monitor = HealthMonitor::new(
                self.dispatcher.pool().targets().to_vec(),
                self.config.health_check.clone(),
                client,
            );
            let monitor_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                monitor.run(monitor_shutdown).await;
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all proxy handler.
/// Peer address is optional so the router also works without connect info.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    state.dispatcher.handle(request, client_addr).await
}
