//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, tracing)
//!     → headers.rs (strip hop-by-hop, X-Forwarded-*)
//!     → [dispatcher picks target, fails over] (proxy/)
//!     → headers.rs (strip hop-by-hop, X-Proxied-By)
//!     → Send to client
//! ```

pub mod headers;
pub mod server;

pub use headers::{X_PROXIED_BY, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
