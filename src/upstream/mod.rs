//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! DecodedRequest (authorized)
//!     → forwarder.rs (method, headers, body, deadline)
//!     → origin server (plain or TLS by URL scheme)
//!     → UpstreamResponse (status + headers now, body streamed later)
//!     or ForwardError (invalid method, timeout, transport)
//! ```

pub mod error;
pub mod forwarder;

pub use error::ForwardError;
pub use forwarder::{Forwarder, UpstreamResponse};
