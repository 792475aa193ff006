//! Request authorization.
//! Checks the shared secret, then the host denylist.

use thiserror::Error;

use crate::codec::DecodedRequest;
use crate::config::FetchConfig;

/// Why a decoded request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("wrong password")]
    WrongPassword,

    #[error("host {host} matches denylist pattern {pattern}")]
    HostDenied { host: String, pattern: String },
}

/// Immutable policy built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct PolicyGate {
    password: String,
    hosts_deny: Vec<String>,
}

impl PolicyGate {
    pub fn new(password: impl Into<String>, hosts_deny: Vec<String>) -> Self {
        Self {
            password: password.into(),
            hosts_deny: hosts_deny.into_iter().map(|p| p.to_ascii_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.password.clone(), config.hosts_deny.clone())
    }

    /// An empty password turns the secret check off.
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Apply both checks in order, stopping at the first failure.
    pub fn authorize(&self, request: &DecodedRequest) -> Result<(), Rejection> {
        if !self.is_open() {
            let supplied = request.param("password").unwrap_or_default();
            if supplied.is_empty() || !constant_time_eq(supplied.as_bytes(), self.password.as_bytes()) {
                return Err(Rejection::WrongPassword);
            }
        }

        if let Some(host) = request.url.host_str() {
            if let Some(pattern) = self.denied_by(host) {
                return Err(Rejection::HostDenied {
                    host: host.to_string(),
                    pattern: pattern.to_string(),
                });
            }
        }
        Ok(())
    }

    /// First denylist pattern that is a suffix of `host`.
    pub fn denied_by(&self, host: &str) -> Option<&str> {
        let host = host.to_ascii_lowercase();
        self.hosts_deny
            .iter()
            .find(|pattern| host.ends_with(pattern.as_str()))
            .map(String::as_str)
    }
}

/// Equality whose running time does not depend on where inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
