//! Request forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (http/server.rs)
//!     → dispatcher.rs (start position, failover loop)
//!     → forwarder.rs (per-target URI rewrite + pooled client)
//!     → body.rs (single-owner request body, guarded response body)
//!     → outcome.rs (per-target request/success/failure counters)
//! ```

pub mod body;
pub mod dispatcher;
pub mod forwarder;
pub mod outcome;

pub use dispatcher::{Dispatcher, TargetStats};
pub use forwarder::{Forward, ForwardError, ForwardFuture, HttpForwarder};
pub use outcome::{OutcomeSnapshot, OutcomeTracker};
