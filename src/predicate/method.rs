//! Method predicate: `Method=GET,POST`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::predicate::{BoxedPredicate, PredicateFactory, RoutePredicate};
use crate::route::args::{BoundArgs, ShortcutType};

#[derive(Debug)]
pub struct MethodPredicate {
    methods: Vec<Method>,
}

impl MethodPredicate {
    pub fn new(methods: Vec<Method>) -> Self {
        Self { methods }
    }
}

#[async_trait]
impl RoutePredicate for MethodPredicate {
    async fn test(&self, ctx: &mut RequestContext) -> GatewayResult<bool> {
        Ok(self.methods.contains(ctx.method()))
    }
}

pub struct MethodPredicateFactory;

impl PredicateFactory for MethodPredicateFactory {
    fn name(&self) -> &'static str {
        "Method"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["methods"]
    }

    fn shortcut_type(&self) -> ShortcutType {
        ShortcutType::GatherList
    }

    fn apply(&self, _route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedPredicate> {
        let methods = args
            .list("methods")
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| GatewayError::binding(args.name(), format!("invalid method '{}'", m)))
            })
            .collect::<GatewayResult<Vec<_>>>()?;
        if methods.is_empty() {
            return Err(GatewayError::binding(args.name(), "at least one method is required"));
        }
        Ok(Arc::new(MethodPredicate::new(methods)))
    }
}
