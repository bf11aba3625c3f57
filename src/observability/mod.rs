//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, health monitor, startup produce:
//!     → logging.rs (structured log events, severity-mapped error events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, text or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every dispatch log event
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, log_gateway_error};
