//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each target
//!     → Target::mark_success / mark_failure
//!     → Dispatcher skips Unhealthy targets when building attempt order
//!
//! State machine (load_balancer/target.rs):
//!     Unknown → Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Opt-in; with probing disabled every target stays eligible
//! - State transitions require consecutive successes/failures
//! - Unknown targets receive traffic

pub mod active;

pub use active::HealthMonitor;
