//! Strategy registry
//!
//! Insertion-ordered name-to-strategy table, populated at startup and safe
//! to read under concurrent admission. Lookups dominate writes.

use std::sync::{Arc, RwLock};

use crate::errors::OrchestratorError;
use crate::strategies::bluegreen::BlueGreen;
use crate::strategies::canary::Canary;
use crate::strategies::quicksync::QuickSync;
use crate::strategies::rolling::Rolling;
use crate::strategies::Strategy;

#[derive(Default)]
pub struct StrategyRegistry {
    strategies: RwLock<Vec<(String, Arc<dyn Strategy>)>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in strategies installed
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let built_in: [Arc<dyn Strategy>; 4] = [
            Arc::new(QuickSync),
            Arc::new(Canary),
            Arc::new(BlueGreen),
            Arc::new(Rolling),
        ];
        for strategy in built_in {
            // Built-in names are unique; registration cannot fail here.
            let name = strategy.name();
            let _ = registry.register(name, strategy);
        }
        registry
    }

    /// Add a strategy; duplicate names are rejected
    pub fn register(
        &self,
        name: impl Into<String>,
        strategy: Arc<dyn Strategy>,
    ) -> Result<(), OrchestratorError> {
        let name = name.into();
        let mut strategies = self.strategies.write().unwrap_or_else(|e| e.into_inner());

        if strategies.iter().any(|(existing, _)| *existing == name) {
            return Err(OrchestratorError::Validation(format!(
                "strategy {} already registered",
                name
            )));
        }

        strategies.push((name, strategy));
        Ok(())
    }

    /// Retrieve a strategy by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        let strategies = self.strategies.read().unwrap_or_else(|e| e.into_inner());
        strategies
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, strategy)| strategy.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered strategy names, in registration order
    pub fn list(&self) -> Vec<String> {
        let strategies = self.strategies.read().unwrap_or_else(|e| e.into_inner());
        strategies.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Remove a strategy by name
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        let mut strategies = self.strategies.write().unwrap_or_else(|e| e.into_inner());
        let index = strategies.iter().position(|(existing, _)| existing == name)?;
        Some(strategies.remove(index).1)
    }
}
