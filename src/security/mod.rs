//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! DecodedRequest:
//!     → policy.rs (shared secret, then host denylist)
//!     → Allow: hand to upstream forwarder
//!     → Reject: 403 error page, no upstream call
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any check failure
//! - No side effects beyond the outcome
//! - Denylist is a plain suffix comparison, no globbing

pub mod policy;

pub use policy::{PolicyGate, Rejection};
