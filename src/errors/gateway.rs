//! Client-facing structured error.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::errors::kind::{ErrorKind, Severity};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Marks responses generated by the gateway rather than a target.
pub const X_GATEWAY_ERROR: &str = "x-gateway-error";

/// A classified failure with optional context and cause.
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct GatewayError {
    kind: ErrorKind,
    message: String,
    context: BTreeMap<String, Value>,
    #[source]
    cause: Option<BoxError>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: BTreeMap::new(),
            cause: None,
        }
    }

    /// Attach a key/value pair. Keys appear at the top level of the JSON body.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        self.cause = Some(cause.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }

    pub fn backoff(&self) -> Option<Duration> {
        self.kind.backoff()
    }

    pub fn context(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Serializable body sent to the client.
    pub fn body(&self) -> ErrorBody<'_> {
        let profile = self.kind.profile();
        ErrorBody {
            error: profile.category,
            code: profile.code,
            message: &self.message,
            details: self.cause.as_ref().map(ToString::to_string),
            context: &self.context,
        }
    }
}

/// JSON shape of a gateway error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'static str,
    pub code: &'static str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(flatten)]
    pub context: &'a BTreeMap<String, Value>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(self.body())).into_response();

        let headers = response.headers_mut();
        headers.insert(X_GATEWAY_ERROR, HeaderValue::from_static("true"));
        if let Some(backoff) = self.backoff() {
            let secs = backoff.as_secs() + u64::from(backoff.subsec_nanos() > 0);
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let err = GatewayError::new(ErrorKind::UpstreamTimeout, "backend slow");
        assert_eq!(err.to_string(), "[UPSTREAM_TIMEOUT] backend slow");
    }

    #[test]
    fn body_flattens_context() {
        let err = GatewayError::new(ErrorKind::UpstreamUnavailable, "All targets unavailable")
            .with_context("last_target", "10.0.0.2:3000")
            .with_context("attempts", 2)
            .with_cause(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"));

        let json = serde_json::to_value(err.body()).unwrap();
        assert_eq!(json["error"], "Bad Gateway");
        assert_eq!(json["code"], "UPSTREAM_UNAVAILABLE");
        assert_eq!(json["last_target"], "10.0.0.2:3000");
        assert_eq!(json["attempts"], 2);
        assert_eq!(json["details"], "refused");
    }

    #[test]
    fn response_carries_status_and_headers() {
        let response = GatewayError::new(ErrorKind::UpstreamOverloaded, "busy").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[X_GATEWAY_ERROR], "true");
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");

        let response = GatewayError::new(ErrorKind::UpstreamProtocol, "garbage").into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
