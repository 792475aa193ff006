//! Obfuscating urlfetch relay library.

pub mod codec;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod obfuscation;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod upstream;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
