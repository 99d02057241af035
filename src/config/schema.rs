//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! default every field, so an empty file is a valid configuration. Unknown
//! keys are rejected at parse time.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observability::logging::LogFormat;
use crate::resilience::settings::{Settings, TripPolicy, WindowExpiry, DEFAULT_MAX_REQUESTS};

/// Root configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerFileConfig {
    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Policy for breakers without an override.
    pub defaults: BreakerConfig,

    /// Per-dependency overrides keyed by breaker name.
    pub breakers: HashMap<String, BreakerConfig>,

    /// Workload for the simulator binary.
    pub simulation: SimulationConfig,
}

/// Policy of a single breaker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerConfig {
    /// Time spent open before probing, in milliseconds.
    pub timeout_ms: u64,

    /// Trial calls while half-open.
    pub max_requests: u32,

    /// Closed-state observation window in milliseconds (default: timeout).
    pub interval_ms: Option<u64>,

    /// Action when the closed window elapses.
    pub window_expiry: WindowExpiry,

    /// When to open.
    pub trip: TripPolicy,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            max_requests: DEFAULT_MAX_REQUESTS,
            interval_ms: None,
            window_expiry: WindowExpiry::default(),
            trip: TripPolicy::default(),
        }
    }
}

impl BreakerConfig {
    /// Build breaker settings for the breaker called `name`.
    pub fn to_settings(&self, name: &str) -> Settings {
        let mut settings = Settings::new(name)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_max_requests(self.max_requests)
            .with_window_expiry(self.window_expiry)
            .with_trip_policy(self.trip.clone());
        if let Some(interval_ms) = self.interval_ms {
            settings = settings.with_interval(Duration::from_millis(interval_ms));
        }
        settings
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Simulated workload for `breaker-sim run`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Breaker protecting the simulated dependency.
    pub breaker: String,

    /// Total calls to issue.
    pub calls: u32,

    /// Calls in flight at once.
    pub concurrency: u32,

    /// Probability that a call to the dependency fails.
    pub failure_rate: f64,

    /// Simulated latency of each call in milliseconds.
    pub latency_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            breaker: "upstream".to_string(),
            calls: 200,
            concurrency: 8,
            failure_rate: 0.3,
            latency_ms: 5,
        }
    }
}
