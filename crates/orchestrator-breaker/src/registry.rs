use std::collections::HashMap;
use std::sync::Arc;

use crate::{Breaker, BreakerConfig};

/// Holds one [`Breaker`] per named dependency: `nlu_service`, `planner_service`,
/// and one entry per registered tool. Built once at startup from config and
/// shared (via `Arc`) across every request.
#[derive(Default, Clone)]
pub struct BreakerRegistry {
    breakers: HashMap<String, Arc<Breaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self { breakers: HashMap::new() }
    }

    pub fn register(&mut self, config: BreakerConfig) -> Arc<Breaker> {
        let name = config.name.clone();
        let breaker = Arc::new(Breaker::new(config));
        self.breakers.insert(name, Arc::clone(&breaker));
        breaker
    }

    pub fn get(&self, name: &str) -> Option<Arc<Breaker>> {
        self.breakers.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.breakers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_looks_up_by_name() {
        let mut registry = BreakerRegistry::new();
        registry.register(BreakerConfig::builder("nlu_service").build());
        registry.register(BreakerConfig::builder("planner_service").build());

        assert!(registry.get("nlu_service").is_some());
        assert!(registry.get("weather_tool").is_none());
        assert_eq!(registry.names().count(), 2);
    }
}
