//! In-process circuit breaker library.

pub mod config;
pub mod observability;
pub mod resilience;

pub use config::BreakerFileConfig;
pub use resilience::{BreakerError, BreakerRegistry, CircuitBreaker, Counts, Settings, State};
