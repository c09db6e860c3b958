//! Routes: definitions, compilation, the live table and its refresh.
//!
//! # Data Flow
//! ```text
//! DefinitionSource (config routes, routes file, ...)        source.rs
//!     → RouteRepository (insertion-ordered, copy-on-write)   repository.rs
//!     → RouteCompiler (predicate AND chain + sorted filters)  compiler.rs
//!     → RouteTable (atomic snapshot swap)                     table.rs
//!     → per request: first route whose predicate matches
//!
//! RouteRefresher (refresh.rs): timer / trigger / admin call
//!     → pull, upsert, compile, swap, republish weight groups
//! ```
//!
//! # Design Decisions
//! - Readers load a snapshot and never wait on a refresh in progress
//! - Routes are evaluated by `order`, ties in definition order
//! - A bad definition never takes the gateway down; the error policy
//!   decides whether it is skipped or aborts the refresh

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use url::Url;

use crate::filter::OrderedFilter;
use crate::predicate::BoxedPredicate;
use crate::weight::WeightConfig;

pub mod args;
pub mod compiler;
pub mod definition;
pub mod refresh;
pub mod repository;
pub mod source;
pub mod table;

pub use compiler::{RefreshPolicy, RouteCompiler};
pub use definition::{FilterDefinition, PluginDefinition, PredicateDefinition, RouteDefinition};
pub use refresh::RouteRefresher;
pub use repository::RouteRepository;
pub use source::{CompositeDefinitionSource, DefinitionSource, FileDefinitionSource, StaticDefinitionSource};
pub use table::RouteTable;

/// Compiled, executable form of a route definition.
pub struct Route {
    id: String,
    uri: Url,
    order: i32,
    predicate: BoxedPredicate,
    filters: Vec<OrderedFilter>,
    weights: Vec<WeightConfig>,
    definition: RouteDefinition,
}

impl Route {
    pub fn new(
        definition: RouteDefinition,
        uri: Url,
        predicate: BoxedPredicate,
        filters: Vec<OrderedFilter>,
    ) -> Self {
        Self {
            id: definition.id.clone(),
            uri,
            order: definition.order,
            predicate,
            filters,
            weights: Vec::new(),
            definition,
        }
    }

    /// Group weights declared by this route's predicates.
    pub fn with_weights(mut self, weights: Vec<WeightConfig>) -> Self {
        self.weights = weights;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn predicate(&self) -> &BoxedPredicate {
        &self.predicate
    }

    /// Route filters, sorted by order.
    pub fn filters(&self) -> &[OrderedFilter] {
        &self.filters
    }

    pub fn weight_configs(&self) -> &[WeightConfig] {
        &self.weights
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.definition.metadata
    }

    pub fn definition(&self) -> &RouteDefinition {
        &self.definition
    }

    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            id: self.id.clone(),
            uri: self.uri.to_string(),
            order: self.order,
            predicate: format!("{:?}", self.predicate),
            filters: self.filters.iter().map(|f| format!("{:?}", f)).collect(),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("uri", &self.uri.as_str())
            .field("order", &self.order)
            .field("predicate", &self.predicate)
            .field("filters", &self.filters)
            .finish()
    }
}

/// Admin view of a compiled route.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub id: String,
    pub uri: String,
    pub order: i32,
    pub predicate: String,
    pub filters: Vec<String>,
}
