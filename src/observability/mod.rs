//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, one audit line per request)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Metrics endpoint (Prometheus scrape, off by default)
//! ```
//!
//! # Design Decisions
//! - Request ID (`x-request-id`) is attached to the request span by the HTTP layer
//! - Metric calls are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
