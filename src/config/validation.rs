//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check mode-specific requirements (relay pool, target URL)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{Mode, RelayConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a parsed configuration, collecting every error.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }

    let fetch = &config.fetch;
    if fetch.content_type.trim().is_empty() {
        errors.push(ValidationError::new("fetch.content_type", "must not be empty"));
    }
    if fetch.media_content_type.trim().is_empty() {
        errors.push(ValidationError::new("fetch.media_content_type", "must not be empty"));
    }
    if fetch.content_type.eq_ignore_ascii_case(&fetch.media_content_type) {
        errors.push(ValidationError::new(
            "fetch.media_content_type",
            "must differ from fetch.content_type",
        ));
    }
    if fetch.password.chars().next().is_some_and(|c| !c.is_ascii()) {
        errors.push(ValidationError::new(
            "fetch.password",
            "first character must be ASCII, it is the response XOR key",
        ));
    }
    if fetch.hosts_deny.iter().any(|p| p.trim().is_empty()) {
        errors.push(ValidationError::new(
            "fetch.hosts_deny",
            "empty pattern would deny every host",
        ));
    }
    if fetch.max_frame_bytes == 0 {
        errors.push(ValidationError::new("fetch.max_frame_bytes", "must be > 0"));
    }

    let upstream = &config.upstream;
    if upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be > 0"));
    }
    if upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.connect_timeout_secs", "must be > 0"));
    }
    if upstream.max_timeout_secs < upstream.timeout_secs {
        errors.push(ValidationError::new(
            "upstream.max_timeout_secs",
            "must be >= upstream.timeout_secs",
        ));
    }

    if config.mode == Mode::Relay {
        match Url::parse(&config.relay.target_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                "relay.target_url",
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                "relay.target_url",
                format!("invalid URL: {}", e),
            )),
        }
        if config.relay.hosts.is_empty() {
            errors.push(ValidationError::new("relay.hosts", "relay mode needs at least one host"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
