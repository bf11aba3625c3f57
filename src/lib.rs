//! Velocity Gateway: an HTTP reverse proxy that spreads requests across a
//! fixed pool of targets and fails over on connection-level errors.

pub mod admin;
pub mod config;
pub mod errors;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use errors::{ErrorKind, GatewayError};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::TargetPool;
pub use proxy::Dispatcher;
