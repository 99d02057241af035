//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Protected call:
//!     → circuit_breaker.rs (admit or reject under the lock)
//!     → caller's operation runs outside the lock
//!     → circuit_breaker.rs (record outcome, maybe transition)
//!
//! Per dependency:
//!     registry.rs (name → breaker, built from config defaults/overrides)
//! ```
//!
//! # Design Decisions
//! - The breaker never retries; retry policy belongs to the caller
//! - No background timers; clock.rs is read only when a call arrives
//! - Per-dependency circuit breaker (not global)

pub mod circuit_breaker;
pub mod clock;
pub mod counts;
pub mod error;
pub mod registry;
pub mod settings;
pub mod state;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, Permit};
pub use clock::{Clock, ManualClock, SystemClock};
pub use counts::Counts;
pub use error::BreakerError;
pub use registry::BreakerRegistry;
pub use settings::{Settings, TripPolicy, WindowExpiry};
pub use state::State;
