//! Failure classification.
//!
//! # Responsibilities
//! - Map a raw forwarding failure onto a closed [`ErrorKind`]
//! - Attach the kind's severity, status, retry eligibility and backoff hint
//!
//! # Design Decisions
//! - Pure function of the error value; the same error always classifies the same way
//! - Transport errors are matched on their source chain, never on message text
//! - Anything unrecognised is a non-retriable `UpstreamError`

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use axum::http::StatusCode;

use crate::errors::{ErrorKind, Severity};
use crate::proxy::forwarder::ForwardError;

/// Result of classifying a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub status: StatusCode,
    pub retriable: bool,
    pub backoff: Option<Duration>,
}

impl From<ErrorKind> for Classification {
    fn from(kind: ErrorKind) -> Self {
        let profile = kind.profile();
        Self {
            kind,
            severity: profile.severity,
            status: profile.status,
            retriable: profile.retriable,
            backoff: profile.backoff,
        }
    }
}

/// Classify a failed attempt.
pub fn classify(error: &ForwardError) -> Classification {
    let kind = match error {
        ForwardError::Timeout(_) => ErrorKind::UpstreamTimeout,
        ForwardError::Saturated(_) => ErrorKind::UpstreamOverloaded,
        ForwardError::InvalidRequest(_) => ErrorKind::MalformedRequest,
        ForwardError::Transport(source) => classify_transport(source.as_ref()),
    };
    Classification::from(kind)
}

fn classify_transport(error: &(dyn StdError + 'static)) -> ErrorKind {
    let mut connect_failure = false;
    let mut current = Some(error);

    while let Some(err) = current {
        if let Some(legacy) = err.downcast_ref::<hyper_util::client::legacy::Error>() {
            connect_failure |= legacy.is_connect();
        }

        if let Some(io) = err.downcast_ref::<io::Error>() {
            if let Some(kind) = classify_io(io.kind()) {
                return kind;
            }
        }

        if let Some(hyper) = err.downcast_ref::<hyper::Error>() {
            if let Some(kind) = classify_hyper(hyper) {
                return kind;
            }
        }

        current = err.source();
    }

    if connect_failure {
        ErrorKind::UpstreamUnavailable
    } else {
        ErrorKind::UpstreamError
    }
}

fn classify_io(kind: io::ErrorKind) -> Option<ErrorKind> {
    match kind {
        io::ErrorKind::TimedOut => Some(ErrorKind::UpstreamTimeout),
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::UnexpectedEof => Some(ErrorKind::UpstreamUnavailable),
        _ => None,
    }
}

fn classify_hyper(err: &hyper::Error) -> Option<ErrorKind> {
    if err.is_timeout() {
        Some(ErrorKind::UpstreamTimeout)
    } else if err.is_parse() || err.is_parse_status() || err.is_parse_too_large() {
        Some(ErrorKind::UpstreamProtocol)
    } else if err.is_incomplete_message() || err.is_closed() || err.is_canceled() {
        Some(ErrorKind::UpstreamUnavailable)
    } else {
        None
    }
}
