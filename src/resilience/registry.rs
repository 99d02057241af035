//! Named breakers, one per protected dependency.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::schema::{BreakerConfig, BreakerFileConfig};
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker};
use crate::resilience::clock::{Clock, SystemClock};

/// A thread-safe set of breakers keyed by dependency name.
///
/// Breakers are created on first use from the per-name override, or from
/// the defaults when no override exists. Clones share the same breakers.
#[derive(Clone, Debug)]
pub struct BreakerRegistry {
    breakers: Arc<DashMap<String, Arc<CircuitBreaker>>>,
    defaults: BreakerConfig,
    overrides: Arc<HashMap<String, BreakerConfig>>,
    clock: Arc<dyn Clock>,
}

impl BreakerRegistry {
    pub fn new(defaults: BreakerConfig, overrides: HashMap<String, BreakerConfig>) -> Self {
        Self::with_clock(defaults, overrides, Arc::new(SystemClock))
    }

    /// Registry whose breakers all read time from `clock`.
    pub fn with_clock(
        defaults: BreakerConfig,
        overrides: HashMap<String, BreakerConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            breakers: Arc::new(DashMap::new()),
            defaults,
            overrides: Arc::new(overrides),
            clock,
        }
    }

    pub fn from_config(config: &BreakerFileConfig) -> Self {
        Self::new(config.defaults.clone(), config.breakers.clone())
    }

    /// Breaker for `name`, created on first request.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.value().clone();
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let config = self.overrides.get(name).unwrap_or(&self.defaults);
                tracing::debug!(
                    breaker = name,
                    override_applied = self.overrides.contains_key(name),
                    "Registering circuit breaker"
                );
                Arc::new(CircuitBreaker::with_clock(config.to_settings(name), self.clock.clone()))
            })
            .value()
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Snapshot of every registered breaker, sorted by name.
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        // Collect handles first so no map shard stays locked while a breaker
        // resolves its state.
        let breakers: Vec<Arc<CircuitBreaker>> = self.breakers.iter().map(|r| r.value().clone()).collect();
        let mut snapshots: Vec<BreakerSnapshot> = breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default(), HashMap::new())
    }
}
