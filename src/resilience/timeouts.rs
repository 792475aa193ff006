//! Timeout enforcement.
//!
//! # Responsibilities
//! - Resolve the deadline for one upstream exchange
//! - Wrap the header phase of an upstream call with a Tokio timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; dropping the future closes the socket
//! - Timeout errors are distinct from other errors
//! - A client may shorten or extend the deadline only within configured bounds

use std::future::Future;
use std::time::Duration;

use crate::config::UpstreamConfig;

/// The deadline elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed(pub Duration);

/// Deadline for one request: the `timeout` parameter (seconds) when it
/// parses, clamped to `[1, max_timeout_secs]`, else the configured default.
pub fn request_deadline(config: &UpstreamConfig, requested: Option<&str>) -> Duration {
    let secs = requested
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(|secs| secs.clamp(1, config.max_timeout_secs.max(1)))
        .unwrap_or(config.timeout_secs);
    Duration::from_secs(secs)
}

/// Connect timeout, never longer than the overall deadline.
pub fn connect_deadline(config: &UpstreamConfig) -> Duration {
    Duration::from_secs(config.connect_timeout_secs.min(config.timeout_secs))
}

/// Run `fut` with a deadline.
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| Elapsed(deadline))
}
