//! Request dispatch with failover.
//!
//! # Responsibilities
//! - Pick a starting target per request and walk the pool on failure
//! - Record one outcome per attempt
//! - Relay the first successful response without buffering it
//! - Produce a single classified error when every eligible target failed
//!
//! # Data Flow
//! ```text
//! Request
//!     → correlation id + forward headers (once)
//!     → balancer picks start position s
//!     → attempt order: s, s+1, ... (mod n), unhealthy targets skipped
//!     → per attempt: reserve slot → forward under timeout → classify on error
//!     → success: relay response | retriable & body untouched: next target
//!     → otherwise: terminal GatewayError from the last attempt
//! ```
//!
//! # Design Decisions
//! - Each target is tried at most once per request
//! - Failover never re-sends a body that a failed attempt already started reading
//! - No delay between attempts
//! - The whole-request deadline caps each attempt's timeout; when it runs out
//!   the in-flight attempt counts as a failure and no further target is tried

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::LoadBalancingConfig;
use crate::errors::{ErrorKind, GatewayError};
use crate::http::headers::{correlation_id, finish_response_headers, prepare_forward_headers};
use crate::load_balancer::{balancer_for, AttemptGuard, LoadBalancer, Target, TargetPool};
use crate::observability::{log_gateway_error, metrics};
use crate::proxy::body::{BodySlot, GuardedBody};
use crate::proxy::forwarder::ForwardError;
use crate::proxy::outcome::OutcomeTracker;
use crate::resilience::{classify, with_timeout, Classification};

/// Per-target view served by the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct TargetStats {
    pub index: usize,
    pub url: String,
    pub name: Option<String>,
    pub weight: u32,
    pub healthy: bool,
    pub active_attempts: usize,
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
}

struct Failure {
    index: usize,
    error: ForwardError,
    class: Classification,
}

/// Routes requests across the pool.
///
/// A request that failed over may already have been acted on by an earlier
/// target (for example one that closed the connection after reading the
/// headers). Making such requests safe to repeat is the caller's job; set
/// `retry_non_idempotent = false` to give POST/PATCH a single attempt.
#[derive(Debug)]
pub struct Dispatcher {
    pool: TargetPool,
    balancer: Box<dyn LoadBalancer>,
    outcomes: OutcomeTracker,
    retry_non_idempotent: bool,
    request_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(pool: TargetPool, config: &LoadBalancingConfig) -> Self {
        debug_assert!(!pool.is_empty(), "dispatcher needs at least one target");
        let outcomes = OutcomeTracker::new(pool.len());
        Self {
            balancer: balancer_for(config.algorithm),
            pool,
            outcomes,
            retry_non_idempotent: config.retry_non_idempotent,
            request_timeout: None,
        }
    }

    /// Bound the time from dispatch until response headers, across all attempts.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Time left before the request deadline, if one is set.
    fn remaining(&self, started: Instant) -> Option<Duration> {
        self.request_timeout
            .map(|timeout| timeout.saturating_sub(started.elapsed()))
    }

    pub fn pool(&self) -> &TargetPool {
        &self.pool
    }

    pub fn outcomes(&self) -> &OutcomeTracker {
        &self.outcomes
    }

    /// Dispatch and render any terminal error as a JSON response.
    pub async fn handle(&self, request: Request<Body>, client_addr: Option<SocketAddr>) -> Response<Body> {
        match self.dispatch(request, client_addr).await {
            Ok(response) => response,
            Err(error) => error.into_response(),
        }
    }

    pub async fn dispatch(
        &self,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Response<Body>, GatewayError> {
        let started = Instant::now();
        let (mut parts, body) = request.into_parts();
        let request_id = correlation_id(&parts.headers, &parts.method);
        prepare_forward_headers(&mut parts.headers, &parts.uri, client_addr);

        let targets = self.pool.targets();
        let total = targets.len();
        let start = self.balancer.next_index(targets).unwrap_or(0);
        let order: Vec<usize> = (0..total)
            .map(|offset| (start + offset) % total)
            .filter(|&i| targets[i].is_healthy())
            .collect();

        if order.is_empty() {
            let error = GatewayError::new(ErrorKind::NoHealthyTargets, "No healthy targets available")
                .with_context("request_id", request_id)
                .with_context("attempts", 0);
            return Err(self.fail(error, started));
        }

        let max_attempts = if self.retry_non_idempotent || parts.method.is_idempotent() {
            order.len()
        } else {
            1
        };

        let slot = BodySlot::new(body);
        let mut attempts = 0usize;
        let mut last: Option<Failure> = None;

        for &index in order.iter().take(max_attempts) {
            let budget = self.remaining(started);
            if budget.is_some_and(|b| b.is_zero()) {
                break;
            }

            let target = &targets[index];
            attempts += 1;

            tracing::info!(
                request_id = %request_id,
                method = %parts.method,
                path = %parts.uri.path(),
                target = %target.label(),
                attempt = attempts,
                total_targets = total,
                "Forwarding request"
            );
            self.outcomes.record_attempt(index);

            match attempt(target, &parts, &slot, budget).await {
                Ok((response, guard)) => {
                    self.outcomes.record_success(index);
                    metrics::record_attempt(target.label(), "success");
                    metrics::record_dispatch("success", started);

                    tracing::info!(
                        request_id = %request_id,
                        target = %target.label(),
                        status = response.status().as_u16(),
                        "Upstream responded"
                    );

                    let (mut head, body) = response.into_parts();
                    finish_response_headers(&mut head.headers);
                    return Ok(Response::from_parts(head, Body::new(GuardedBody::new(body, guard))));
                }
                Err(error) => {
                    self.outcomes.record_failure(index);
                    let class = classify(&error);
                    metrics::record_attempt(target.label(), class.kind.code());

                    tracing::warn!(
                        request_id = %request_id,
                        target = %target.label(),
                        attempt = attempts,
                        kind = %class.kind,
                        error = %error,
                        "Attempt failed"
                    );

                    let stop = !class.retriable || slot.is_consumed();
                    last = Some(Failure { index, error, class });
                    if stop {
                        break;
                    }
                }
            }
        }

        let expired = self.remaining(started).is_some_and(|b| b.is_zero());

        tracing::warn!(
            request_id = %request_id,
            method = %parts.method,
            path = %parts.uri.path(),
            attempts,
            expired,
            "Dispatch failed"
        );

        let Some(Failure { index, error, class }) = last else {
            let error = if expired {
                GatewayError::new(ErrorKind::UpstreamTimeout, "Request deadline exceeded")
                    .with_context("attempts", 0)
            } else {
                GatewayError::new(ErrorKind::Internal, "Dispatch ended without an attempt")
            };
            return Err(self.fail(error.with_context("request_id", request_id), started));
        };

        if expired {
            let error = GatewayError::new(ErrorKind::UpstreamTimeout, "Request deadline exceeded")
                .with_context("last_target", targets[index].authority())
                .with_context("attempts", attempts)
                .with_context("request_id", request_id)
                .with_cause(error);
            return Err(self.fail(error, started));
        }

        let message = if !class.retriable {
            "Upstream request failed"
        } else if slot.is_consumed() && attempts < order.len() {
            "Request body already sent; cannot fail over"
        } else if attempts < order.len() {
            "Request method is not eligible for failover"
        } else {
            "All targets unavailable"
        };

        let error = GatewayError::new(class.kind, message)
            .with_context("last_target", targets[index].authority())
            .with_context("attempts", attempts)
            .with_context("request_id", request_id)
            .with_cause(error);
        Err(self.fail(error, started))
    }

    fn fail(&self, error: GatewayError, started: Instant) -> GatewayError {
        log_gateway_error(&error);
        metrics::record_dispatch(error.kind().code(), started);
        error
    }

    pub fn stats(&self) -> Vec<TargetStats> {
        self.pool
            .targets()
            .iter()
            .enumerate()
            .map(|(index, target)| {
                let counts = self.outcomes.get(index).unwrap_or_default();
                TargetStats {
                    index,
                    url: target.url().to_string(),
                    name: target.descriptor().name.clone(),
                    weight: target.weight(),
                    healthy: target.is_healthy(),
                    active_attempts: target.active_attempts(),
                    requests: counts.requests,
                    successes: counts.successes,
                    failures: counts.failures,
                }
            })
            .collect()
    }
}

/// One try against one target. The guard stays with a successful response.
///
/// `budget` is what is left of the request deadline; it shortens the target's
/// own timeout but never extends it.
async fn attempt(
    target: &Arc<Target>,
    parts: &Parts,
    slot: &BodySlot,
    budget: Option<Duration>,
) -> Result<(Response<Body>, AttemptGuard), ForwardError> {
    let guard = target.try_acquire().ok_or_else(|| {
        ForwardError::Saturated(target.descriptor().max_connections.unwrap_or_default())
    })?;

    let mut request = Request::new(slot.attempt_body());
    *request.method_mut() = parts.method.clone();
    *request.uri_mut() = parts.uri.clone();
    *request.headers_mut() = parts.headers.clone();

    let timeout = budget.map_or(target.timeout(), |b| b.min(target.timeout()));
    let response = with_timeout(timeout, target.forwarder().forward(request)).await?;
    Ok((response, guard))
}
