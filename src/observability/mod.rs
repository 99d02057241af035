//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers produce:
//!     → logging.rs (transitions, rejections, panics as log events)
//!     → metrics.rs (counters and a state gauge per breaker)
//!
//! Consumers:
//!     → Log aggregation (stderr, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The library only emits events; binaries install subscriber and recorder
//! - Metrics are cheap (atomic increments behind the facade)

pub mod logging;
pub mod metrics;
