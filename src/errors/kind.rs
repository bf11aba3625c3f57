//! Error taxonomy.
//!
//! Every failure the gateway can surface is one [`ErrorKind`]. Each kind maps
//! to a fixed [`KindProfile`] through an exhaustive match, so adding a kind
//! forces its status, severity and retry policy to be decided in one place.

use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use serde::Serialize;

/// Severity tier of an error. Drives log verbosity, never control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::Critical => "critical",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the exchange is at fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    Client,
    Gateway,
    Upstream,
}

/// Closed set of error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unclassified fault inside the gateway.
    Internal,
    /// Invalid configuration; only raised at startup.
    Configuration,
    /// No target is eligible to receive the request.
    NoHealthyTargets,
    /// Target did not produce response headers in time.
    UpstreamTimeout,
    /// Target could not be reached or dropped the connection.
    UpstreamUnavailable,
    /// Target is at its concurrent attempt limit.
    UpstreamOverloaded,
    /// Target answered with something that is not valid HTTP.
    UpstreamProtocol,
    /// Any other transport failure.
    UpstreamError,
    /// The inbound request cannot be forwarded as-is.
    MalformedRequest,
}

/// Fixed attributes of an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindProfile {
    pub code: &'static str,
    pub category: &'static str,
    pub fault: Fault,
    pub severity: Severity,
    pub status: StatusCode,
    pub retriable: bool,
    pub backoff: Option<Duration>,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::Internal,
        ErrorKind::Configuration,
        ErrorKind::NoHealthyTargets,
        ErrorKind::UpstreamTimeout,
        ErrorKind::UpstreamUnavailable,
        ErrorKind::UpstreamOverloaded,
        ErrorKind::UpstreamProtocol,
        ErrorKind::UpstreamError,
        ErrorKind::MalformedRequest,
    ];

    pub const fn profile(self) -> KindProfile {
        match self {
            ErrorKind::Internal => KindProfile {
                code: "GATEWAY_INTERNAL_ERROR",
                category: "Internal Server Error",
                fault: Fault::Gateway,
                severity: Severity::Error,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                retriable: false,
                backoff: None,
            },
            ErrorKind::Configuration => KindProfile {
                code: "GATEWAY_CONFIG_ERROR",
                category: "Configuration Error",
                fault: Fault::Gateway,
                severity: Severity::Fatal,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                retriable: false,
                backoff: None,
            },
            ErrorKind::NoHealthyTargets => KindProfile {
                code: "LB_NO_HEALTHY_TARGETS",
                category: "Service Unavailable",
                fault: Fault::Gateway,
                severity: Severity::Critical,
                status: StatusCode::SERVICE_UNAVAILABLE,
                retriable: false,
                backoff: None,
            },
            ErrorKind::UpstreamTimeout => KindProfile {
                code: "UPSTREAM_TIMEOUT",
                category: "Bad Gateway",
                fault: Fault::Upstream,
                severity: Severity::Warn,
                status: StatusCode::BAD_GATEWAY,
                retriable: true,
                backoff: Some(Duration::from_secs(1)),
            },
            ErrorKind::UpstreamUnavailable => KindProfile {
                code: "UPSTREAM_UNAVAILABLE",
                category: "Bad Gateway",
                fault: Fault::Upstream,
                severity: Severity::Error,
                status: StatusCode::BAD_GATEWAY,
                retriable: true,
                backoff: Some(Duration::from_secs(2)),
            },
            ErrorKind::UpstreamOverloaded => KindProfile {
                code: "UPSTREAM_OVERLOADED",
                category: "Service Unavailable",
                fault: Fault::Upstream,
                severity: Severity::Warn,
                status: StatusCode::SERVICE_UNAVAILABLE,
                retriable: true,
                backoff: Some(Duration::from_secs(5)),
            },
            ErrorKind::UpstreamProtocol => KindProfile {
                code: "UPSTREAM_PROTOCOL_ERROR",
                category: "Bad Gateway",
                fault: Fault::Upstream,
                severity: Severity::Error,
                status: StatusCode::BAD_GATEWAY,
                retriable: false,
                backoff: None,
            },
            ErrorKind::UpstreamError => KindProfile {
                code: "UPSTREAM_ERROR",
                category: "Bad Gateway",
                fault: Fault::Upstream,
                severity: Severity::Error,
                status: StatusCode::BAD_GATEWAY,
                retriable: false,
                backoff: None,
            },
            ErrorKind::MalformedRequest => KindProfile {
                code: "CLIENT_BAD_REQUEST",
                category: "Bad Request",
                fault: Fault::Client,
                severity: Severity::Info,
                status: StatusCode::BAD_REQUEST,
                retriable: false,
                backoff: None,
            },
        }
    }

    pub fn code(self) -> &'static str {
        self.profile().code
    }

    pub fn status(self) -> StatusCode {
        self.profile().status
    }

    pub fn severity(self) -> Severity {
        self.profile().severity
    }

    pub fn is_retriable(self) -> bool {
        self.profile().retriable
    }

    pub fn backoff(self) -> Option<Duration> {
        self.profile().backoff
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Warn < Severity::Error);
        assert!(Severity::Critical < Severity::Fatal);
    }

    #[test]
    fn status_classes_follow_fault() {
        for kind in ErrorKind::ALL {
            let profile = kind.profile();
            match profile.fault {
                Fault::Client => assert!(profile.status.is_client_error(), "{}", kind),
                Fault::Gateway | Fault::Upstream => {
                    assert!(profile.status.is_server_error(), "{}", kind)
                }
            }
        }
    }

    #[test]
    fn only_upstream_transient_kinds_retry() {
        let retriable: Vec<_> = ErrorKind::ALL
            .into_iter()
            .filter(|k| k.is_retriable())
            .collect();
        assert_eq!(
            retriable,
            vec![
                ErrorKind::UpstreamTimeout,
                ErrorKind::UpstreamUnavailable,
                ErrorKind::UpstreamOverloaded
            ]
        );
        for kind in retriable {
            assert!(kind.backoff().is_some());
        }
    }

    #[test]
    fn fixed_status_mapping() {
        assert_eq!(ErrorKind::UpstreamUnavailable.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorKind::UpstreamOverloaded.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorKind::NoHealthyTargets.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorKind::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorKind::MalformedRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::NoHealthyTargets.severity(), Severity::Critical);
        assert_eq!(ErrorKind::Configuration.severity(), Severity::Fatal);
    }
}
