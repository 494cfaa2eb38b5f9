//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch stages produce:
//!     → logging.rs (structured events; app Logger for faults and timing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached to every per-request event
//! - Metrics are cheap no-ops until an exporter is installed

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, Logger};
