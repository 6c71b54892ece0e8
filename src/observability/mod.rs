//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every request produces:
//!     → logging.rs (structured log events, JSON in production)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracing.rs (one span per request carrying the correlation id)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - The global subscriber is installed once by the binary; library code only
//!   emits events
//! - Metric updates go through the `metrics` facade and are no-ops until an
//!   exporter is installed

pub mod logging;
pub mod metrics;
pub mod tracing;
