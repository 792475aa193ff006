//! Obfuscation subsystem.
//!
//! # Data Flow
//! ```text
//! origin headers
//!     → disguise.rs (pick outer Content-Type once, before any byte is sent)
//! serialized head + body chunks
//!     → xor.rs (byte-wise XOR with the first secret byte)
//!     → client
//! ```
//!
//! # Design Decisions
//! - Two-phase: headers are inspected first, the body is streamed after
//! - XOR is position-independent, so chunking never changes the output

pub mod disguise;
pub mod xor;

pub use disguise::{Disguise, Wrapping};
pub use xor::XorCipher;
