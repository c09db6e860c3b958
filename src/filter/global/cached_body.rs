//! Body caching for routes that need to replay the request body.

use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use dashmap::DashSet;

use crate::context::RequestContext;
use crate::error::GatewayResult;
use crate::filter::global::ADAPT_CACHED_BODY_ORDER;
use crate::filter::{FilterChain, GatewayFilter};

/// Route ids whose requests get their body buffered.
///
/// Grows only: once a route asks for caching it keeps it.
#[derive(Debug, Default)]
pub struct BodyCachingRoutes {
    routes: DashSet<String>,
}

impl BodyCachingRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self, route_id: &str) {
        if self.routes.insert(route_id.to_string()) {
            tracing::debug!(route_id = %route_id, "Body caching enabled");
        }
    }

    pub fn is_enabled(&self, route_id: &str) -> bool {
        self.routes.contains(route_id)
    }
}

#[derive(Debug)]
pub struct AdaptCachedBodyFilter {
    routes: Arc<BodyCachingRoutes>,
}

impl AdaptCachedBodyFilter {
    pub fn new(routes: Arc<BodyCachingRoutes>) -> Self {
        Self { routes }
    }
}

#[async_trait]
impl GatewayFilter for AdaptCachedBodyFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let wanted = ctx.cached_body().is_none() && ctx.route().is_some_and(|r| self.routes.is_enabled(r.id()));
        if wanted {
            let body = ctx.cache_body().await?;
            tracing::trace!(request_id = %ctx.request_id(), bytes = body.len(), "Cached request body");
        }
        chain.next(ctx).await
    }

    fn order(&self) -> Option<i32> {
        Some(ADAPT_CACHED_BODY_ORDER)
    }
}
