//! Per-target forwarding handles.
//!
//! # Responsibilities
//! - Rewrite a request URI onto a target base URL
//! - Send the request over a pooled HTTP/1.1 + HTTP/2 client (plain or TLS)
//! - Report transport failures without interpreting them
//!
//! # Design Decisions
//! - One `HttpForwarder` per target, built at pool construction and reused
//! - All forwarders share one connection pool; hyper keys it by authority
//! - Response bodies are never buffered

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use url::{Position, Url};

use crate::config::TransportConfig;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type ForwardFuture = Pin<Box<dyn Future<Output = Result<Response<Body>, ForwardError>> + Send>>;

/// Shared upstream client type.
pub type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Raw outcome of a failed attempt, before classification.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("no response headers within {0:?}")]
    Timeout(Duration),

    #[error("target at max in-flight attempts ({0})")]
    Saturated(usize),

    #[error("request cannot be forwarded: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
}

/// Something that can carry one request to one target.
pub trait Forward: Send + Sync + fmt::Debug {
    fn forward(&self, request: Request<Body>) -> ForwardFuture;
}

/// Forwards to a fixed base URL using the shared client.
#[derive(Clone)]
pub struct HttpForwarder {
    client: HttpsClient,
    base: Url,
}

impl HttpForwarder {
    pub fn new(client: HttpsClient, base: Url) -> Self {
        Self { client, base }
    }
}

impl fmt::Debug for HttpForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpForwarder")
            .field("base", &self.base.as_str())
            .finish()
    }
}

impl Forward for HttpForwarder {
    fn forward(&self, mut request: Request<Body>) -> ForwardFuture {
        let client = self.client.clone();
        let uri = upstream_uri(&self.base, request.uri());

        Box::pin(async move {
            *request.uri_mut() = uri?;
            let response = client
                .request(request)
                .await
                .map_err(|e| ForwardError::Transport(Box::new(e)))?;
            Ok(response.map(Body::new))
        })
    }
}

/// Build the client shared by every target forwarder.
///
/// The TLS crypto provider is selected explicitly; more than one may be
/// compiled into the binary.
pub fn build_client(config: &TransportConfig) -> Result<HttpsClient, rustls::Error> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);
    http.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http);

    Ok(Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .build(https))
}

/// Map an incoming request URI onto `base`.
///
/// Paths are joined with exactly one slash; queries are concatenated with `&`.
pub fn upstream_uri(base: &Url, incoming: &Uri) -> Result<Uri, ForwardError> {
    let authority = &base[Position::BeforeHost..Position::AfterPort];
    let path = join_paths(base.path(), incoming.path());

    let query = match (base.query().filter(|q| !q.is_empty()), incoming.query().filter(|q| !q.is_empty())) {
        (Some(a), Some(b)) => format!("?{}&{}", a, b),
        (Some(q), None) | (None, Some(q)) => format!("?{}", q),
        (None, None) => String::new(),
    };

    let raw = format!("{}://{}{}{}", base.scheme(), authority, path, query);
    Uri::try_from(raw.as_str()).map_err(|e| ForwardError::InvalidRequest(e.to_string()))
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process forwarder with a scripted sequence of outcomes.

    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::http::{HeaderMap, Method, StatusCode};

    use super::*;

    #[derive(Debug, Clone)]
    pub(crate) enum Step {
        /// Respond with this status; the body is the forwarder's name.
        Respond(StatusCode),
        /// Fail as if the TCP connect was refused.
        Refuse,
        /// Fail with an error the classifier does not recognise.
        Garbage,
        /// Never produce response headers.
        Hang,
        /// Read the whole request body, then fail with a reset.
        DrainThenReset,
        /// Read the whole request body and respond 200 with it.
        Echo,
    }

    #[derive(Debug, Clone)]
    pub(crate) struct Seen {
        pub method: Method,
        pub uri: Uri,
        pub headers: HeaderMap,
        pub body: Option<Vec<u8>>,
    }

    #[derive(Debug)]
    pub(crate) struct ScriptedForwarder {
        name: String,
        script: Mutex<VecDeque<Step>>,
        fallback: Step,
        calls: AtomicUsize,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl ScriptedForwarder {
        pub(crate) fn new(name: &str, script: Vec<Step>, fallback: Step) -> Self {
            Self {
                name: name.to_string(),
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicUsize::new(0),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn always_ok() -> Self {
            Self::named("ok")
        }

        pub(crate) fn named(name: &str) -> Self {
            Self::new(name, Vec::new(), Step::Respond(StatusCode::OK))
        }

        pub(crate) fn refusing(name: &str) -> Self {
            Self::new(name, Vec::new(), Step::Refuse)
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn seen(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }

        fn next_step(&self) -> Step {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn io_error(kind: io::ErrorKind) -> ForwardError {
        ForwardError::Transport(Box::new(io::Error::new(kind, "scripted")))
    }

    impl Forward for ScriptedForwarder {
        fn forward(&self, request: Request<Body>) -> ForwardFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.next_step();
            let name = self.name.clone();
            let seen = self.seen.clone();

            Box::pin(async move {
                let (parts, body) = request.into_parts();
                let mut record = Seen {
                    method: parts.method,
                    uri: parts.uri,
                    headers: parts.headers,
                    body: None,
                };

                let result = match step {
                    Step::Respond(status) => Ok(Response::builder()
                        .status(status)
                        .header("x-upstream", name.as_str())
                        .body(Body::from(name))
                        .unwrap()),
                    Step::Refuse => Err(io_error(io::ErrorKind::ConnectionRefused)),
                    Step::Garbage => Err(io_error(io::ErrorKind::InvalidData)),
                    Step::Hang => std::future::pending().await,
                    Step::DrainThenReset => {
                        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
                        record.body = Some(bytes.to_vec());
                        Err(io_error(io::ErrorKind::ConnectionReset))
                    }
                    Step::Echo => {
                        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
                        record.body = Some(bytes.to_vec());
                        Ok(Response::builder()
                            .header("x-upstream", name.as_str())
                            .body(Body::from(bytes))
                            .unwrap())
                    }
                };

                seen.lock().unwrap().push(record);
                result
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(base: &str, incoming: &str) -> String {
        let base = Url::parse(base).unwrap();
        let incoming: Uri = incoming.parse().unwrap();
        upstream_uri(&base, &incoming).unwrap().to_string()
    }

    #[tokio::test]
    async fn client_builds_with_explicit_crypto_provider() {
        let client = build_client(&TransportConfig::default()).unwrap();
        let forwarder = HttpForwarder::new(client, Url::parse("https://10.0.0.1:8443").unwrap());
        assert!(format!("{:?}", forwarder).contains("10.0.0.1:8443"));
    }

    #[test]
    fn joins_paths_with_single_slash() {
        assert_eq!(map("http://10.0.0.1:3000", "/users/7"), "http://10.0.0.1:3000/users/7");
        assert_eq!(map("http://10.0.0.1:3000/api/", "/users"), "http://10.0.0.1:3000/api/users");
        assert_eq!(map("http://10.0.0.1:3000/api", "/users"), "http://10.0.0.1:3000/api/users");
    }

    #[test]
    fn merges_queries() {
        assert_eq!(map("http://h/?key=1", "/q?a=b"), "http://h/q?key=1&a=b");
        assert_eq!(map("http://h", "/q?a=b"), "http://h/q?a=b");
        assert_eq!(map("http://h/?key=1", "/q"), "http://h/q?key=1");
    }

    #[test]
    fn keeps_https_and_default_port_elision() {
        assert_eq!(map("https://api.example.com", "/"), "https://api.example.com/");
    }

    #[tokio::test]
    async fn scripted_forwarder_follows_script() {
        use testing::{ScriptedForwarder, Step};

        let f = ScriptedForwarder::new(
            "b",
            vec![Step::Refuse],
            Step::Respond(axum::http::StatusCode::ACCEPTED),
        );
        let req = || Request::get("/").body(Body::empty()).unwrap();

        assert!(matches!(f.forward(req()).await, Err(ForwardError::Transport(_))));
        assert_eq!(f.forward(req()).await.unwrap().status(), 202);
        assert_eq!(f.calls(), 2);
    }
}
