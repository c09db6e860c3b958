//! Route definition → compiled route.

use std::sync::Arc;

use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::filter::{sort_filters, FilterRegistry, OrderedFilter};
use crate::predicate::{self, PredicateRegistry};
use crate::route::definition::{FilterDefinition, RouteDefinition};
use crate::route::Route;

/// What a refresh does with a definition that fails to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Log and drop the route; compile the rest.
    #[default]
    ContinueOnError,
    /// Abort the refresh; the previous table stays in place.
    FailOnError,
}

impl RefreshPolicy {
    pub fn from_fail_on_error(fail: bool) -> Self {
        if fail {
            RefreshPolicy::FailOnError
        } else {
            RefreshPolicy::ContinueOnError
        }
    }
}

pub struct RouteCompiler {
    predicates: PredicateRegistry,
    filters: FilterRegistry,
    default_filters: Vec<FilterDefinition>,
}

impl RouteCompiler {
    pub fn new(predicates: PredicateRegistry, filters: FilterRegistry, default_filters: Vec<FilterDefinition>) -> Self {
        Self {
            predicates,
            filters,
            default_filters,
        }
    }

    pub fn predicate_names(&self) -> Vec<&str> {
        self.predicates.names()
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.names()
    }

    /// Compile one definition. Compiling has no effect outside the
    /// returned route.
    pub fn compile(&self, definition: &RouteDefinition) -> GatewayResult<Route> {
        if definition.id.trim().is_empty() {
            return Err(GatewayError::InvalidArgument("id may not be empty".into()));
        }
        let uri = Url::parse(&definition.uri).map_err(|e| {
            GatewayError::InvalidArgument(format!("route {} has invalid uri '{}': {}", definition.id, definition.uri, e))
        })?;

        let predicates = definition
            .predicates
            .iter()
            .map(|p| self.predicates.lookup(&definition.id, p))
            .collect::<GatewayResult<Vec<_>>>()?;
        let weights = predicates.iter().filter_map(|p| p.weight_config()).collect();

        let mut filters = self
            .default_filters
            .iter()
            .chain(definition.filters.iter())
            .enumerate()
            .map(|(position, filter_def)| {
                let filter = self.filters.lookup(&definition.id, filter_def)?;
                let order = filter.order().unwrap_or(position as i32 + 1);
                Ok(OrderedFilter::new(order, filter))
            })
            .collect::<GatewayResult<Vec<_>>>()?;
        sort_filters(&mut filters);

        Ok(Route::new(definition.clone(), uri, predicate::all(predicates), filters).with_weights(weights))
    }

    /// Compile a full definition set into table order.
    pub fn compile_all(&self, definitions: &[RouteDefinition], policy: RefreshPolicy) -> GatewayResult<Vec<Arc<Route>>> {
        let mut routes = Vec::with_capacity(definitions.len());
        for definition in definitions {
            match self.compile(definition) {
                Ok(route) => routes.push(Arc::new(route)),
                Err(e) if policy == RefreshPolicy::ContinueOnError => {
                    tracing::warn!(route_id = %definition.id, error = %e, "RouteDefinition will be ignored");
                }
                Err(e) => {
                    tracing::error!(route_id = %definition.id, error = %e, "RouteDefinition failed to compile");
                    return Err(e);
                }
            }
        }
        routes.sort_by_key(|route| route.order());
        Ok(routes)
    }
}
