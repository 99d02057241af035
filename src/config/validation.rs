//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ratios within bounds)
//! - Check the metrics address parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BreakerFileConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{BreakerConfig, BreakerFileConfig};
use crate::resilience::settings::TripPolicy;

/// A single semantic problem, located by its config path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: String, value: String },

    #[error("simulation breaker name must not be empty")]
    EmptyBreakerName,
}

pub fn validate_config(config: &BreakerFileConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_breaker("defaults", &config.defaults, &mut errors);

    let mut names: Vec<&String> = config.breakers.keys().collect();
    names.sort();
    for name in names {
        validate_breaker(&format!("breakers.{}", name), &config.breakers[name], &mut errors);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address".to_string(),
            value: config.observability.metrics_address.clone(),
        });
    }

    let sim = &config.simulation;
    if sim.breaker.trim().is_empty() {
        errors.push(ValidationError::EmptyBreakerName);
    }
    if sim.concurrency == 0 {
        errors.push(zero("simulation.concurrency"));
    }
    if !(0.0..=1.0).contains(&sim.failure_rate) {
        errors.push(ValidationError::OutOfRange {
            field: "simulation.failure_rate".to_string(),
            value: sim.failure_rate,
            min: 0.0,
            max: 1.0,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_breaker(path: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    if breaker.timeout_ms == 0 {
        errors.push(zero(&format!("{}.timeout_ms", path)));
    }
    if breaker.max_requests == 0 {
        errors.push(zero(&format!("{}.max_requests", path)));
    }
    if breaker.interval_ms == Some(0) {
        errors.push(zero(&format!("{}.interval_ms", path)));
    }

    match breaker.trip {
        TripPolicy::ConsecutiveFailures { threshold } => {
            if threshold == 0 {
                errors.push(zero(&format!("{}.trip.threshold", path)));
            }
        }
        TripPolicy::FailureRatio { min_requests, ratio } => {
            if min_requests == 0 {
                errors.push(zero(&format!("{}.trip.min_requests", path)));
            }
            // ratio 0 would trip on the first request
            if !(ratio > 0.0 && ratio <= 1.0) {
                errors.push(ValidationError::OutOfRange {
                    field: format!("{}.trip.ratio", path),
                    value: ratio,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
    }
}

fn zero(field: &str) -> ValidationError {
    ValidationError::Zero {
        field: field.to_string(),
    }
}
