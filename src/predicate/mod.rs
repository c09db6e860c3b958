//! Route predicates.
//!
//! # Data Flow
//! ```text
//! PredicateDefinition (name + args)
//!     → factory.rs (registry lookup, argument binding)
//!     → concrete predicate (path.rs, host.rs, ...)
//!     → all(): left-to-right AND chain
//!     → Route::predicate, evaluated per request in table order
//! ```
//!
//! # Design Decisions
//! - Predicates are asynchronous: some read the request body
//! - AND evaluates the right side only when the left side matched, so
//!   side effects (body caching) never run for an already-rejected route
//! - Zero predicates match every request

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::GatewayResult;
use crate::weight::WeightConfig;

pub mod factory;
pub mod header;
pub mod host;
pub mod method;
pub mod path;
pub mod pattern;
pub mod query;
pub mod read_body;
pub mod remote_addr;
pub mod weight;

pub use factory::{PredicateFactory, PredicateRegistry};

/// Asynchronous match function over a request.
#[async_trait]
pub trait RoutePredicate: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    async fn test(&self, ctx: &mut RequestContext) -> GatewayResult<bool>;

    /// Group weight the owning route contributes once it is compiled.
    fn weight_config(&self) -> Option<WeightConfig> {
        None
    }
}

/// Shared predicate handle.
pub type BoxedPredicate = Arc<dyn RoutePredicate>;

/// Matches every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysTrue;

#[async_trait]
impl RoutePredicate for AlwaysTrue {
    async fn test(&self, _ctx: &mut RequestContext) -> GatewayResult<bool> {
        Ok(true)
    }
}

/// Short-circuiting logical AND of two predicates.
#[derive(Debug)]
pub struct AndPredicate {
    left: BoxedPredicate,
    right: BoxedPredicate,
}

impl AndPredicate {
    pub fn new(left: BoxedPredicate, right: BoxedPredicate) -> Self {
        Self { left, right }
    }
}

#[async_trait]
impl RoutePredicate for AndPredicate {
    async fn test(&self, ctx: &mut RequestContext) -> GatewayResult<bool> {
        if !self.left.test(ctx).await? {
            return Ok(false);
        }
        self.right.test(ctx).await
    }
}

/// Combine predicates left-to-right with AND.
pub fn all(predicates: Vec<BoxedPredicate>) -> BoxedPredicate {
    let mut iter = predicates.into_iter();
    match iter.next() {
        None => Arc::new(AlwaysTrue),
        Some(first) => iter.fold(first, |acc, next| Arc::new(AndPredicate::new(acc, next)) as BoxedPredicate),
    }
}
