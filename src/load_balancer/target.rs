//! Target abstraction.
//!
//! # Responsibilities
//! - Represent a single backend target and its descriptor metadata
//! - Hold the cached forwarding handle for that target
//! - Enforce the optional max in-flight attempt limit
//! - Track health state (Unknown/Healthy/Unhealthy) for active probing

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::proxy::forwarder::Forward;

/// Health State enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// Descriptor fields of a target, as accepted from configuration.
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    pub url: Url,
    pub name: Option<String>,
    pub weight: u32,
    pub tags: BTreeMap<String, String>,
    pub max_connections: Option<usize>,
    pub timeout: Duration,
}

impl TargetDescriptor {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            url,
            name: None,
            weight: 1,
            tags: BTreeMap::new(),
            max_connections: None,
            timeout,
        }
    }
}

/// A single pool member.
pub struct Target {
    descriptor: TargetDescriptor,
    /// `host[:port]`, used in logs and client-facing errors.
    authority: String,
    forwarder: Arc<dyn Forward>,

    /// Attempts currently waiting on or streaming from this target.
    active_attempts: AtomicUsize,

    state: AtomicU8,
    consecutive_failures: AtomicUsize,
    consecutive_successes: AtomicUsize,
}

impl Target {
    pub fn new(descriptor: TargetDescriptor, forwarder: Arc<dyn Forward>) -> Self {
        let authority = authority_of(&descriptor.url);
        Self {
            descriptor,
            authority,
            forwarder,
            active_attempts: AtomicUsize::new(0),
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
        }
    }

    pub fn descriptor(&self) -> &TargetDescriptor {
        &self.descriptor
    }

    pub fn url(&self) -> &Url {
        &self.descriptor.url
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Name if configured, else the authority.
    pub fn label(&self) -> &str {
        self.descriptor.name.as_deref().unwrap_or(&self.authority)
    }

    pub fn weight(&self) -> u32 {
        self.descriptor.weight
    }

    pub fn timeout(&self) -> Duration {
        self.descriptor.timeout
    }

    pub fn forwarder(&self) -> &Arc<dyn Forward> {
        &self.forwarder
    }

    pub fn active_attempts(&self) -> usize {
        self.active_attempts.load(Ordering::Relaxed)
    }

    /// Reserve an attempt slot, honouring `max_connections`.
    pub fn try_acquire(self: &Arc<Self>) -> Option<AttemptGuard> {
        let limit = self.descriptor.max_connections.unwrap_or(usize::MAX);
        let mut prev = self.active_attempts.load(Ordering::Relaxed);
        loop {
            if prev >= limit {
                return None;
            }
            match self.active_attempts.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(AttemptGuard {
            target: self.clone(),
        })
    }

    // --- Health Logic ---

    pub fn health(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    /// Healthy or Unknown targets receive traffic.
    pub fn is_healthy(&self) -> bool {
        self.health() != HealthState::Unhealthy
    }

    /// Report a successful probe. Returns `true` on a transition to Healthy.
    pub fn mark_success(&self, healthy_threshold: usize) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.health() == HealthState::Healthy {
            return false;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.consecutive_successes.store(0, Ordering::Relaxed);
            self.state.store(HealthState::Healthy as u8, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Report a failed probe. Returns `true` on a transition to Unhealthy.
    pub fn mark_failure(&self, unhealthy_threshold: usize) -> bool {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if self.health() == HealthState::Unhealthy {
            return false;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            self.state.store(HealthState::Unhealthy as u8, Ordering::Relaxed);
            return true;
        }
        false
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("url", &self.descriptor.url.as_str())
            .field("weight", &self.descriptor.weight)
            .field("health", &self.health())
            .field("active_attempts", &self.active_attempts())
            .finish()
    }
}

fn authority_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// A RAII guard that releases an attempt slot on drop.
///
/// Successful responses carry the guard inside their body so the slot stays
/// reserved until the client has received the whole response.
#[derive(Debug)]
pub struct AttemptGuard {
    target: Arc<Target>,
}

impl Deref for AttemptGuard {
    type Target = Target;
    fn deref(&self) -> &Self::Target {
        &self.target
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        self.target.active_attempts.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::proxy::forwarder::testing::ScriptedForwarder;

    pub(crate) fn target(url: &str) -> Arc<Target> {
        let descriptor = TargetDescriptor::new(Url::parse(url).unwrap(), Duration::from_secs(1));
        Arc::new(Target::new(descriptor, Arc::new(ScriptedForwarder::always_ok())))
    }

    #[test]
    fn authority_keeps_explicit_port() {
        assert_eq!(target("http://10.0.0.1:3000/api").authority(), "10.0.0.1:3000");
        assert_eq!(target("https://api.example.com").authority(), "api.example.com");
    }

    #[test]
    fn guard_enforces_max_connections() {
        let mut descriptor =
            TargetDescriptor::new(Url::parse("http://127.0.0.1:1").unwrap(), Duration::from_secs(1));
        descriptor.max_connections = Some(2);
        let t = Arc::new(Target::new(descriptor, Arc::new(ScriptedForwarder::always_ok())));

        let g1 = t.try_acquire().unwrap();
        let _g2 = t.try_acquire().unwrap();
        assert!(t.try_acquire().is_none());
        assert_eq!(t.active_attempts(), 2);

        drop(g1);
        assert!(t.try_acquire().is_some());
    }

    #[test]
    fn unlimited_without_max_connections() {
        let t = target("http://127.0.0.1:1");
        let guards: Vec<_> = (0..64).map(|_| t.try_acquire().unwrap()).collect();
        assert_eq!(t.active_attempts(), 64);
        drop(guards);
        assert_eq!(t.active_attempts(), 0);
    }

    #[test]
    fn health_hysteresis() {
        let t = target("http://127.0.0.1:1");
        assert_eq!(t.health(), HealthState::Unknown);
        assert!(t.is_healthy());

        assert!(!t.mark_failure(3));
        assert!(!t.mark_failure(3));
        assert!(t.mark_failure(3));
        assert!(!t.is_healthy());

        // one success is not enough to recover
        assert!(!t.mark_success(2));
        assert!(!t.is_healthy());
        assert!(t.mark_success(2));
        assert_eq!(t.health(), HealthState::Healthy);
    }

    #[test]
    fn failure_streak_resets_on_success() {
        let t = target("http://127.0.0.1:1");
        t.mark_failure(3);
        t.mark_failure(3);
        t.mark_success(1);
        assert!(!t.mark_failure(3));
        assert!(t.is_healthy());
    }
}
