//! Gateway error taxonomy.
//!
//! # Data Flow
//! ```text
//! Transport failure (ForwardError)
//!     → resilience::classify (pure mapping)
//!     → ErrorKind + KindProfile (status, severity, retriable, backoff)
//!     → GatewayError on the terminal attempt only
//!     → JSON body to the client
//! ```

pub mod gateway;
pub mod kind;

pub use gateway::{ErrorBody, GatewayError, X_GATEWAY_ERROR};
pub use kind::{ErrorKind, Fault, KindProfile, Severity};
