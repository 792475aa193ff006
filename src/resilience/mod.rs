//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to origin:
//!     → timeouts.rs (resolve deadline, enforce it on the upstream call)
//!     → On expiry: abort, report a timeout (no retry)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Exactly one upstream attempt per client request

pub mod timeouts;
