//! Weight predicate: `Weight=group1, 8`.
//!
//! The predicate carries its route's [`WeightConfig`]; the refresher hands
//! it to the [`WeightCalculator`](crate::weight::WeightCalculator) once the
//! compiled table is swapped in. Matching only compares the route id against
//! the selection made for the request.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::predicate::{BoxedPredicate, PredicateFactory, RoutePredicate};
use crate::route::args::BoundArgs;
use crate::weight::WeightConfig;

#[derive(Debug)]
pub struct WeightPredicate {
    config: WeightConfig,
}

#[async_trait]
impl RoutePredicate for WeightPredicate {
    async fn test(&self, ctx: &mut RequestContext) -> GatewayResult<bool> {
        let chosen = ctx.weights().get(&self.config.group);
        if chosen.is_none() {
            tracing::trace!(group = %self.config.group, "No weight selection for group");
        }
        Ok(chosen.is_some_and(|id| *id == self.config.route_id))
    }

    fn weight_config(&self) -> Option<WeightConfig> {
        Some(self.config.clone())
    }
}

pub struct WeightPredicateFactory;

impl PredicateFactory for WeightPredicateFactory {
    fn name(&self) -> &'static str {
        "Weight"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["group", "weight"]
    }

    fn apply(&self, route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedPredicate> {
        let group = args.required("group")?.trim().to_string();
        if group.is_empty() {
            return Err(GatewayError::binding(args.name(), "group must not be empty"));
        }
        let weight = args.parse_required::<u32>("weight")?;

        Ok(Arc::new(WeightPredicate {
            config: WeightConfig::new(group, route_id, weight),
        }))
    }
}
