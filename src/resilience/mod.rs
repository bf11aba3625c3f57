//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt against a target:
//!     → timeouts.rs (bound the wait for response headers)
//!     → On failure: classify.rs (kind, status, retriable, backoff hint)
//!     → Dispatcher decides: next target, or terminal error response
//! ```
//!
//! # Design Decisions
//! - Every attempt has a deadline
//! - Retry eligibility is a property of the error kind, not of the call site
//! - No sleeping between attempts; backoff hints are only surfaced to clients

pub mod classify;
pub mod timeouts;

pub use classify::{classify, Classification};
pub use timeouts::with_timeout;
