//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! coordinator / cluster / service / handler
//!     → logging.rs (tracing events, EnvFilter)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Recorders are free functions; without an installed exporter they are no-ops
//! - Labels are operation names and proxy addresses, never request payloads

pub mod logging;
pub mod metrics;
