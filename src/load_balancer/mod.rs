//! Load balancing subsystem (relay mode).
//!
//! # Data Flow
//! ```text
//! Relay request
//!     → pool.rs (configured equivalent hosts)
//!     → random.rs (uniform pick, fresh on every request)
//!     → RelayHost used to rewrite the target URL authority
//! ```
//!
//! # Design Decisions
//! - Selection is stateless; no stickiness between requests
//! - No failover: a dead host surfaces as an error to that request
//! - Algorithm sits behind a trait so the pool does not care how it picks

pub mod pool;
pub mod random;

use crate::load_balancer::pool::RelayHost;

/// Picks one host out of a pool.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn next_host<'a>(&self, hosts: &'a [RelayHost]) -> Option<&'a RelayHost>;
}

pub use pool::HostPool;
pub use random::RandomChoice;
