//! Upstream failure taxonomy.

use std::error::Error as _;
use std::time::Duration;
use thiserror::Error;

/// Why an upstream exchange produced no response head.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The decoded method is not a valid HTTP token.
    #[error("invalid method {0:?}")]
    InvalidMethod(String),

    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    /// The deadline passed before the origin answered.
    #[error("request timeout after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Connection refused, DNS failure, TLS failure, protocol error...
    #[error("{0}")]
    Transport(String),

    #[error("upstream client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

impl ForwardError {
    /// Transport error carrying the whole cause chain as text.
    pub fn transport(err: &reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        ForwardError::Transport(message)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ForwardError::Timeout(_))
    }
}
