//! Circuit breaker simulator.
//!
//! Drives a named breaker from a config file against a simulated dependency
//! that fails at a configurable rate, then prints what the breaker did.
//!
//! ```text
//!   workers (tokio tasks)
//!       │  execute_async
//!       ▼
//!   ┌───────────────┐   admitted   ┌──────────────────────┐
//!   │ CircuitBreaker│─────────────▶│ simulated dependency │
//!   │  (registry)   │◀─────────────│  latency + failures  │
//!   └───────────────┘   outcome    └──────────────────────┘
//!       │ rejected (open / too many requests)
//!       ▼
//!   tally ──▶ JSON report on stdout
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

use circuit_breaker::config::validation::validate_config;
use circuit_breaker::config::{load_config, BreakerFileConfig, ConfigError, SimulationConfig};
use circuit_breaker::observability::{logging, metrics};
use circuit_breaker::resilience::{BreakerError, BreakerRegistry, BreakerSnapshot};

#[derive(Parser)]
#[command(name = "breaker-sim")]
#[command(about = "Drive a circuit breaker against a simulated flaky dependency", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulated workload and print a JSON report
    Run {
        #[arg(long)]
        calls: Option<u32>,
        #[arg(long)]
        concurrency: Option<u32>,
        #[arg(long)]
        failure_rate: Option<f64>,
        /// Breaker name to protect the dependency with
        #[arg(long)]
        breaker: Option<String>,
    },
    /// Validate the configuration and print it
    Check,
}

#[derive(Debug, Error)]
enum DependencyError {
    #[error("dependency unavailable")]
    Unavailable,
}

#[derive(Debug, Default)]
struct Tally {
    succeeded: AtomicU32,
    failed: AtomicU32,
    rejected_open: AtomicU32,
    rejected_too_many: AtomicU32,
}

#[derive(Debug, Serialize)]
struct TallyReport {
    succeeded: u32,
    failed: u32,
    rejected_open: u32,
    rejected_too_many: u32,
}

#[derive(Debug, Serialize)]
struct Report {
    simulation: SimulationConfig,
    tally: TallyReport,
    breakers: Vec<BreakerSnapshot>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => BreakerFileConfig::default(),
    };

    match cli.command {
        Commands::Check => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Run {
            calls,
            concurrency,
            failure_rate,
            breaker,
        } => {
            let sim = &mut config.simulation;
            if let Some(calls) = calls {
                sim.calls = calls;
            }
            if let Some(concurrency) = concurrency {
                sim.concurrency = concurrency;
            }
            if let Some(failure_rate) = failure_rate {
                sim.failure_rate = failure_rate;
            }
            if let Some(breaker) = breaker {
                sim.breaker = breaker;
            }
            validate_config(&config).map_err(ConfigError::Validation)?;

            logging::init_logging(&config.observability)?;
            if config.observability.metrics_enabled {
                metrics::init_metrics(config.observability.metrics_address.parse()?)?;
            }

            tracing::info!(
                breaker = %config.simulation.breaker,
                calls = config.simulation.calls,
                concurrency = config.simulation.concurrency,
                failure_rate = config.simulation.failure_rate,
                "Simulation starting"
            );

            let registry = BreakerRegistry::from_config(&config);
            let report = simulate(&registry, config.simulation.clone()).await;

            tracing::info!(
                succeeded = report.tally.succeeded,
                failed = report.tally.failed,
                rejected = report.tally.rejected_open + report.tally.rejected_too_many,
                "Simulation finished"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn simulate(registry: &BreakerRegistry, sim: SimulationConfig) -> Report {
    let breaker = registry.get_or_create(&sim.breaker);
    let tally = Arc::new(Tally::default());
    let issued = Arc::new(AtomicU32::new(0));
    let latency = Duration::from_millis(sim.latency_ms);

    let mut workers = Vec::with_capacity(sim.concurrency as usize);
    for _ in 0..sim.concurrency {
        let breaker = breaker.clone();
        let tally = tally.clone();
        let issued = issued.clone();
        let (calls, failure_rate) = (sim.calls, sim.failure_rate);

        workers.push(tokio::spawn(async move {
            while issued.fetch_add(1, Ordering::Relaxed) < calls {
                let result = breaker
                    .execute_async(|| call_dependency(latency, failure_rate))
                    .await;

                match result {
                    Ok(()) => {
                        tally.succeeded.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(BreakerError::Operation(_)) => {
                        tally.failed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(BreakerError::Open) => {
                        tally.rejected_open.fetch_add(1, Ordering::Relaxed);
                        tokio::time::sleep(latency).await;
                    }
                    Err(BreakerError::TooManyRequests) => {
                        tally.rejected_too_many.fetch_add(1, Ordering::Relaxed);
                        tokio::time::sleep(latency).await;
                    }
                }
            }
        }));
    }

    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "Simulation worker failed");
        }
    }

    Report {
        simulation: sim,
        tally: TallyReport {
            succeeded: tally.succeeded.load(Ordering::Relaxed),
            failed: tally.failed.load(Ordering::Relaxed),
            rejected_open: tally.rejected_open.load(Ordering::Relaxed),
            rejected_too_many: tally.rejected_too_many.load(Ordering::Relaxed),
        },
        breakers: registry.snapshot(),
    }
}

async fn call_dependency(latency: Duration, failure_rate: f64) -> Result<(), DependencyError> {
    tokio::time::sleep(latency).await;
    if fastrand::f64() < failure_rate {
        Err(DependencyError::Unavailable)
    } else {
        Ok(())
    }
}
