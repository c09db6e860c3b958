//! Live compiled route table.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::context::RequestContext;
use crate::error::GatewayResult;
use crate::route::Route;

/// Compiled routes in evaluation order, replaced as a whole on refresh.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: ArcSwap<Vec<Arc<Route>>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, routes: Vec<Arc<Route>>) {
        self.routes.store(Arc::new(routes));
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<Route>>> {
        self.routes.load_full()
    }

    pub fn ids(&self) -> HashSet<String> {
        self.routes.load().iter().map(|r| r.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First route whose predicate matches.
    ///
    /// A failing predicate counts as no match for that route, unless the
    /// failure leaves the request itself unusable (its body could not be
    /// read); evaluation then stops with that error.
    pub async fn lookup(&self, ctx: &mut RequestContext) -> GatewayResult<Option<Arc<Route>>> {
        let routes = self.snapshot();
        for route in routes.iter() {
            match route.predicate().test(ctx).await {
                Ok(true) => {
                    tracing::debug!(request_id = %ctx.request_id(), route_id = %route.id(), "Route matched");
                    return Ok(Some(route.clone()));
                }
                Ok(false) => {}
                Err(e) if e.is_request_error() => {
                    tracing::warn!(request_id = %ctx.request_id(), route_id = %route.id(), error = %e, "Request rejected during route evaluation");
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(route_id = %route.id(), error = %e, "Error applying predicate for route");
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::filter::tests::ctx;
    use crate::route::compiler::tests::compiler;
    use crate::route::compiler::RefreshPolicy;
    use crate::route::definition::{PluginDefinition, RouteDefinition};

    fn table(definitions: &[RouteDefinition]) -> RouteTable {
        let routes = compiler(Vec::new())
            .compile_all(definitions, RefreshPolicy::FailOnError)
            .unwrap();
        let table = RouteTable::new();
        table.replace(routes);
        table
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let table = table(&[
            RouteDefinition::new("api", "http://a").with_predicate(PluginDefinition::parse("Path=/api/**").unwrap()),
            RouteDefinition::new("all", "http://b"),
        ]);

        assert_eq!(table.lookup(&mut ctx("/api/x")).await.unwrap().unwrap().id(), "api");
        assert_eq!(table.lookup(&mut ctx("/other")).await.unwrap().unwrap().id(), "all");
    }

    #[tokio::test]
    async fn test_no_match() {
        let table = table(&[
            RouteDefinition::new("api", "http://a").with_predicate(PluginDefinition::parse("Path=/api/**").unwrap())
        ]);
        assert!(table.lookup(&mut ctx("/nope")).await.unwrap().is_none());
        assert!(RouteTable::new().lookup(&mut ctx("/")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_body_stops_evaluation() {
        let table = table(&[
            RouteDefinition::new("orders", "http://a")
                .with_predicate(PluginDefinition::parse("ReadBody=order").unwrap()),
            RouteDefinition::new("all", "http://b"),
        ]);
        let request = axum::http::Request::post("/submit")
            .header("content-length", (crate::context::MAX_CACHED_BODY_BYTES + 1).to_string())
            .body(axum::body::Body::from("order"))
            .unwrap();
        let mut ctx = RequestContext::new(request);

        assert!(matches!(
            table.lookup(&mut ctx).await,
            Err(crate::error::GatewayError::PayloadTooLarge(_))
        ));
    }
}
