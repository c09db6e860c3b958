//! Filter factory registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{GatewayError, GatewayResult};
use crate::filter::circuit_breaker::CircuitBreakerFilterFactory;
use crate::filter::global::cached_body::BodyCachingRoutes;
use crate::filter::headers::{
    AddRequestHeaderFilterFactory, AddResponseHeaderFilterFactory, PreserveHostHeaderFilterFactory,
};
use crate::filter::prefix_path::PrefixPathFilterFactory;
use crate::filter::retry::{RetryBackoff, RetryFilterFactory};
use crate::filter::rewrite_path::RewritePathFilterFactory;
use crate::filter::strip_prefix::StripPrefixFilterFactory;
use crate::filter::BoxedFilter;
use crate::resilience::ResiliencePolicy;
use crate::route::args::{BoundArgs, ShortcutType};
use crate::route::definition::FilterDefinition;

/// Binds arguments into a configured route filter.
pub trait FilterFactory: Send + Sync {
    /// Registry key, e.g. `RewritePath`.
    fn name(&self) -> &'static str;

    /// Accepted fields; the shortcut form binds them in this order.
    fn fields(&self) -> &'static [&'static str];

    fn shortcut_type(&self) -> ShortcutType {
        ShortcutType::Default
    }

    /// Build the filter for route `route_id`.
    fn apply(&self, route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedFilter>;
}

/// Collaborators the built-in filter factories need.
#[derive(Clone)]
pub struct FilterDependencies {
    pub body_caching: Arc<BodyCachingRoutes>,
    pub resilience: Arc<dyn ResiliencePolicy>,
    pub backoff: RetryBackoff,
}

/// Name → filter factory mapping.
#[derive(Default)]
pub struct FilterRegistry {
    factories: HashMap<String, Arc<dyn FilterFactory>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in route filter.
    pub fn with_defaults(deps: FilterDependencies) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RewritePathFilterFactory));
        registry.register(Arc::new(StripPrefixFilterFactory));
        registry.register(Arc::new(PrefixPathFilterFactory));
        registry.register(Arc::new(AddRequestHeaderFilterFactory));
        registry.register(Arc::new(AddResponseHeaderFilterFactory));
        registry.register(Arc::new(PreserveHostHeaderFilterFactory));
        registry.register(Arc::new(RetryFilterFactory::new(deps.body_caching, deps.backoff)));
        registry.register(Arc::new(CircuitBreakerFilterFactory::new(deps.resilience)));
        registry
    }

    /// Add a factory; a later factory with the same name replaces the earlier one.
    pub fn register(&mut self, factory: Arc<dyn FilterFactory>) {
        let key = factory.name().to_string();
        if self.factories.contains_key(&key) {
            tracing::warn!(name = %key, "A filter factory with this name already exists. It will be overwritten.");
        }
        tracing::info!(name = %key, "Loaded filter factory");
        self.factories.insert(key, factory);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FilterFactory>> {
        self.factories.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve, bind and apply one filter definition.
    pub fn lookup(&self, route_id: &str, definition: &FilterDefinition) -> GatewayResult<BoxedFilter> {
        let factory = self.get(&definition.name).ok_or_else(|| GatewayError::UnknownFactory {
            kind: "filter",
            name: definition.name.clone(),
        })?;
        tracing::debug!(route_id = %route_id, args = %definition.args, name = %definition.name, "Applying filter");
        let bound = BoundArgs::bind(factory.name(), &definition.args, factory.fields(), factory.shortcut_type())?;
        factory.apply(route_id, &bound)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    use crate::resilience::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerPolicy};

    pub(crate) fn test_deps() -> FilterDependencies {
        FilterDependencies {
            body_caching: Arc::new(BodyCachingRoutes::new()),
            resilience: Arc::new(CircuitBreakerPolicy::new(CircuitBreakerConfig {
                failure_threshold: 2,
                open_duration: Duration::from_secs(30),
                timeout: Duration::from_millis(200),
            })),
            backoff: RetryBackoff {
                base_delay_ms: 1,
                max_delay_ms: 2,
            },
        }
    }

    #[test]
    fn test_unknown_filter() {
        let registry = FilterRegistry::with_defaults(test_deps());
        let def = FilterDefinition::parse("Nope=1").unwrap();
        assert!(matches!(
            registry.lookup("r1", &def),
            Err(GatewayError::UnknownFactory { kind: "filter", .. })
        ));
    }

    #[test]
    fn test_lookup_binds_shortcut() {
        let registry = FilterRegistry::with_defaults(test_deps());
        let def = FilterDefinition::parse("StripPrefix=2").unwrap();
        assert!(registry.lookup("r1", &def).is_ok());

        let bad = FilterDefinition::parse("StripPrefix=two").unwrap();
        assert!(matches!(
            registry.lookup("r1", &bad),
            Err(GatewayError::BindingFailure { .. })
        ));
    }

    #[test]
    fn test_default_names() {
        let registry = FilterRegistry::with_defaults(test_deps());
        assert_eq!(
            registry.names(),
            vec![
                "AddRequestHeader",
                "AddResponseHeader",
                "CircuitBreaker",
                "PrefixPath",
                "PreserveHostHeader",
                "Retry",
                "RewritePath",
                "StripPrefix"
            ]
        );
    }
}
