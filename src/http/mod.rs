//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper auto HTTP/1.1 + HTTP/2, request id, trace span)
//!     → fetch.rs (mode = fetch)
//!         POST frame → codec decode → policy → upstream → obfuscated stream
//!         anything else → 302 redirect
//!         failure → response.rs error page, obfuscated
//!     → relay.rs (mode = relay)
//!         random pool host → upstream → verbatim stream, or plain 502
//! ```

pub mod fetch;
pub mod relay;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{HttpServer, ServerError};
