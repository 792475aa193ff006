//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, max_connections permit)
//!     → connection.rs (id, active count, drain on shutdown)
//!     → HTTP layer (one hyper connection task per socket)
//! ```
//!
//! # Design Decisions
//! - The permit is taken before accept, so a full server stops accepting
//!   instead of accepting and dropping
//! - Plain TCP only; TLS termination belongs in front of the relay

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
