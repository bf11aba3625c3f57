//! Weighted round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{target::Target, LoadBalancer};

/// Weighted selector.
///
/// Each cycle of `sum(weights)` requests starts `weight` requests on every
/// target, in pool order. Zero-weight targets are never chosen as a start
/// position but remain reachable through failover. If every weight is zero
/// this degrades to plain round-robin.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    counter: AtomicUsize,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn next_index(&self, targets: &[Arc<Target>]) -> Option<usize> {
        if targets.is_empty() {
            return None;
        }

        let tick = self.counter.fetch_add(1, Ordering::Relaxed);
        let total: usize = targets.iter().map(|t| t.weight() as usize).sum();
        if total == 0 {
            return Some(tick % targets.len());
        }

        let mut slot = tick % total;
        for (index, target) in targets.iter().enumerate() {
            let weight = target.weight() as usize;
            if slot < weight {
                return Some(index);
            }
            slot -= weight;
        }
        None
    }
}
