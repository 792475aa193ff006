//! Relay host pool.
//!
//! # Responsibilities
//! - Parse configured `host` / `host:port` entries
//! - Apply the load balancing algorithm to select a host
//! - Rewrite a target URL to point at the selected host

use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::load_balancer::{random::RandomChoice, LoadBalancer};

/// One equivalent upstream host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayHost {
    pub host: String,
    pub port: Option<u16>,
}

impl FromStr for RelayHost {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Bracketed IPv6 literals keep their colons.
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && (!host.contains(':') || host.ends_with(']')) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port in relay host '{}'", s))?;
                (host, Some(port))
            }
            _ => (s, None),
        };
        if host.is_empty() {
            return Err("relay host must not be empty".to_string());
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for RelayHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.host, port),
            None => write!(f, "{}", self.host),
        }
    }
}

impl RelayHost {
    /// `target` with its authority replaced by this host. The target's own
    /// port is dropped unless this entry names one.
    pub fn rewrite(&self, target: &Url) -> Result<Url, url::ParseError> {
        let mut url = target.clone();
        url.set_host(Some(&self.host))?;
        url.set_port(self.port)
            .map_err(|_| url::ParseError::InvalidPort)?;
        Ok(url)
    }
}

/// Immutable set of relay hosts plus the selection strategy.
#[derive(Debug)]
pub struct HostPool {
    hosts: Vec<RelayHost>,
    strategy: Box<dyn LoadBalancer>,
}

impl HostPool {
    /// Build a pool, skipping entries that do not parse.
    pub fn new(entries: &[String]) -> Self {
        let hosts = entries
            .iter()
            .filter_map(|entry| match entry.parse::<RelayHost>() {
                Ok(host) => Some(host),
                Err(e) => {
                    tracing::warn!(entry = %entry, error = %e, "Invalid relay host");
                    None
                }
            })
            .collect();

        Self {
            hosts,
            strategy: Box::new(RandomChoice::new()),
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn LoadBalancer>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Select a host for one request.
    pub fn pick(&self) -> Option<&RelayHost> {
        let host = self.strategy.next_host(&self.hosts);
        if host.is_none() {
            tracing::debug!(pool_size = self.hosts.len(), "No relay host available");
        }
        host
    }

    pub fn hosts(&self) -> &[RelayHost] {
        &self.hosts
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
