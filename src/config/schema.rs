//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Which request pipeline the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Framed, password-gated, obfuscated urlfetch relay.
    #[default]
    Fetch,
    /// Plain pass-through to a random member of the relay host pool.
    Relay,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fetch" => Ok(Mode::Fetch),
            "relay" => Ok(Mode::Relay),
            other => Err(format!("unknown mode '{}', expected 'fetch' or 'relay'", other)),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Fetch => write!(f, "fetch"),
            Mode::Relay => write!(f, "relay"),
        }
    }
}

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Operating mode.
    pub mode: Mode,

    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Framed urlfetch settings (secret, denylist, disguise).
    pub fetch: FetchConfig,

    /// Upstream request settings.
    pub upstream: UpstreamConfig,

    /// Relay mode target and host pool.
    pub relay: RelayModeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// How long to wait for in-flight connections on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            shutdown_grace_secs: 10,
        }
    }
}

/// Settings for the framed urlfetch pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Shared secret. Empty disables the password check.
    pub password: String,

    /// Hostname suffixes the relay refuses to contact.
    pub hosts_deny: Vec<String>,

    /// Disguise content type for ordinary responses.
    pub content_type: String,

    /// Disguise content type used when the origin serves binary media.
    pub media_content_type: String,

    /// Where requests that are not frames get redirected.
    pub redirect_location: String,

    /// Largest accepted frame in bytes.
    pub max_frame_bytes: usize,

    /// XOR responses disguised with `media_content_type` too.
    pub obfuscate_media: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            hosts_deny: Vec::new(),
            content_type: "image/gif".to_string(),
            media_content_type: "image/x-png".to_string(),
            redirect_location: "https://www.google.com/".to_string(),
            max_frame_bytes: 32 * 1024 * 1024,
            obfuscate_media: true,
        }
    }
}

/// Timeouts applied to every upstream request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Total time for one upstream exchange in seconds.
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Upper bound for the per-request `timeout` parameter.
    pub max_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            connect_timeout_secs: 10,
            max_timeout_secs: 120,
        }
    }
}

/// Relay mode configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayModeConfig {
    /// Fixed target URL; its authority is replaced per request.
    pub target_url: String,

    /// Equivalent upstream hosts (`host` or `host:port`).
    pub hosts: Vec<String>,
}

impl Default for RelayModeConfig {
    fn default() -> Self {
        Self {
            target_url: "http://localhost/".to_string(),
            hosts: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config.mode, Mode::Fetch);
        assert_eq!(config.upstream.timeout_secs, 20);
        assert_eq!(config.fetch.content_type, "image/gif");
        assert!(config.fetch.password.is_empty());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            mode = "relay"

            [fetch]
            password = "123456"
            hosts_deny = [".example.com"]

            [relay]
            target_url = "http://relay.invalid/fetch.php"
            hosts = ["a.example.net", "b.example.net:8080"]
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, Mode::Relay);
        assert_eq!(config.fetch.password, "123456");
        assert_eq!(config.fetch.media_content_type, "image/x-png");
        assert_eq!(config.relay.hosts.len(), 2);
        assert_eq!(config.listener.max_connections, 10_000);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Relay".parse::<Mode>().unwrap(), Mode::Relay);
        assert!("tunnel".parse::<Mode>().is_err());
    }
}
