//! Predicate factory registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{GatewayError, GatewayResult};
use crate::predicate::{
    header::HeaderPredicateFactory, host::HostPredicateFactory, method::MethodPredicateFactory,
    path::PathPredicateFactory, query::QueryPredicateFactory, read_body::ReadBodyPredicateFactory,
    remote_addr::{BlackRemoteAddrPredicateFactory, RemoteAddrPredicateFactory},
    weight::WeightPredicateFactory, BoxedPredicate,
};
use crate::route::args::{BoundArgs, ShortcutType};
use crate::route::definition::PredicateDefinition;

/// Binds arguments into a configured predicate.
pub trait PredicateFactory: Send + Sync {
    /// Registry key, e.g. `Path`.
    fn name(&self) -> &'static str;

    /// Accepted fields; the shortcut form binds them in this order.
    fn fields(&self) -> &'static [&'static str];

    fn shortcut_type(&self) -> ShortcutType {
        ShortcutType::Default
    }

    /// Build the predicate for route `route_id`.
    fn apply(&self, route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedPredicate>;
}

/// Name → predicate factory mapping.
#[derive(Default)]
pub struct PredicateRegistry {
    factories: HashMap<String, Arc<dyn PredicateFactory>>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in predicate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PathPredicateFactory));
        registry.register(Arc::new(HostPredicateFactory));
        registry.register(Arc::new(MethodPredicateFactory));
        registry.register(Arc::new(HeaderPredicateFactory));
        registry.register(Arc::new(QueryPredicateFactory));
        registry.register(Arc::new(RemoteAddrPredicateFactory));
        registry.register(Arc::new(BlackRemoteAddrPredicateFactory));
        registry.register(Arc::new(ReadBodyPredicateFactory));
        registry.register(Arc::new(WeightPredicateFactory));
        registry
    }

    /// Add a factory; a later factory with the same name replaces the earlier one.
    pub fn register(&mut self, factory: Arc<dyn PredicateFactory>) {
        let key = factory.name().to_string();
        if self.factories.contains_key(&key) {
            tracing::warn!(name = %key, "A predicate factory with this name already exists. It will be overwritten.");
        }
        tracing::info!(name = %key, "Loaded predicate factory");
        self.factories.insert(key, factory);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PredicateFactory>> {
        self.factories.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve, bind and apply one predicate definition.
    pub fn lookup(&self, route_id: &str, definition: &PredicateDefinition) -> GatewayResult<BoxedPredicate> {
        let factory = self.get(&definition.name).ok_or_else(|| GatewayError::UnknownFactory {
            kind: "predicate",
            name: definition.name.clone(),
        })?;
        tracing::debug!(route_id = %route_id, args = %definition.args, name = %definition.name, "Applying predicate");
        let bound = BoundArgs::bind(factory.name(), &definition.args, factory.fields(), factory.shortcut_type())?;
        factory.apply(route_id, &bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_factory() {
        let registry = PredicateRegistry::with_defaults();
        let def = PredicateDefinition::parse("Nope=1").unwrap();
        assert!(matches!(
            registry.lookup("r1", &def),
            Err(GatewayError::UnknownFactory { kind: "predicate", .. })
        ));
    }

    #[test]
    fn test_default_names() {
        let registry = PredicateRegistry::with_defaults();
        assert!(registry.names().contains(&"Path"));
        assert!(registry.names().contains(&"Weight"));
    }
}
