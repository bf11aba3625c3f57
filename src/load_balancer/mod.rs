//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Validated TargetConfig[]
//!     → pool.rs (enabled targets only, forwarders built once)
//!     → Dispatcher asks a strategy for the starting position:
//!         - round_robin.rs (rotate through positions)
//!         - weighted.rs (rotate proportionally to weight)
//!     → failover walks the pool from that position
//! ```
//!
//! # Design Decisions
//! - Strategies only pick where a request starts; failover order is pool order
//! - One atomic increment per request, no locks
//! - The pool never changes size after construction

use std::sync::Arc;

use crate::config::Algorithm;

pub mod pool;
pub mod round_robin;
pub mod target;
pub mod weighted;

pub use pool::{PoolError, TargetPool};
pub use target::{AttemptGuard, HealthState, Target, TargetDescriptor};

/// Picks the starting pool position for a request.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Returns `None` only for an empty slice.
    fn next_index(&self, targets: &[Arc<Target>]) -> Option<usize>;
}

/// Strategy for the configured algorithm.
pub fn balancer_for(algorithm: Algorithm) -> Box<dyn LoadBalancer> {
    match algorithm {
        Algorithm::RoundRobin => Box::new(round_robin::RoundRobin::new()),
        Algorithm::WeightedRoundRobin => Box::new(weighted::WeightedRoundRobin::new()),
    }
}
