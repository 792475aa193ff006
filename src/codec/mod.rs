//! Wire codec subsystem.
//!
//! # Data Flow
//! ```text
//! POST body (frame)
//!     → frame.rs (length prefix, inflate header block, split body)
//!     → headers.rs (canonical names, X-URLFETCH-* → parameters)
//!     → DecodedRequest
//!
//! origin response
//!     → response.rs (status line, canonical headers, Set-Cookie expansion)
//!     → bytes handed to the obfuscation layer
//! ```
//!
//! # Design Decisions
//! - Raw deflate only (no zlib/gzip wrapper); any change breaks clients
//! - The header block is fully buffered; the body is a plain byte slice
//! - Header name canonicalization is shared by both directions

pub mod frame;
pub mod headers;
pub mod response;

pub use frame::{
    compress_body, decode_request, encode_request, DecodeError, DecodedRequest, EncodeError,
    FRAME_PROTOCOL,
};
pub use headers::{canonical_name, Headers, PARAM_PREFIX};
pub use response::ResponseHead;
