//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BreakerFileConfig (validated, immutable)
//!     → BreakerConfig::to_settings per breaker
//! ```
//!
//! # Design Decisions
//! - Breaker settings are fixed once a breaker is built; no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::BreakerConfig;
pub use schema::BreakerFileConfig;
pub use schema::ObservabilityConfig;
pub use schema::SimulationConfig;
