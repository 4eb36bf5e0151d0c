//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! cluster generation, rollout polling, acquisition, supervision:
//!     → tracing events with structured fields
//!     → metrics facade (counters, gauges)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG)
//!     → Prometheus scrape, when the runner is given --metrics-address
//! ```

pub mod logging;
pub mod metrics;
