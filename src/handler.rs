//! Gateway request handler.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → RequestContext (remote address, handler for re-entry)
//!     → WeightCalculator::apply (one draw per group)
//!     → RouteTable::lookup (first matching route)
//!     → global filters + route filters, stably sorted
//!     → FilterChain (terminal filter dispatches)
//!     → response, or GatewayError mapped to its status
//!
//! forward: dispatch
//!     → depth check
//!     → RouteTable::lookup, else local axum router, else 404
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::ServiceExt;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::filter::{sort_filters, FilterChain, OrderedFilter};
use crate::observability::metrics;
use crate::route::{Route, RouteTable};
use crate::weight::WeightCalculator;

pub const DEFAULT_MAX_FORWARD_DEPTH: usize = 8;

/// Entry point for every request the gateway serves.
pub struct GatewayHandler {
    table: Arc<RouteTable>,
    weights: Arc<WeightCalculator>,
    global_filters: Vec<OrderedFilter>,
    local: Option<Router>,
    max_forward_depth: usize,
}

impl GatewayHandler {
    pub fn new(table: Arc<RouteTable>, weights: Arc<WeightCalculator>, mut global_filters: Vec<OrderedFilter>) -> Self {
        sort_filters(&mut global_filters);
        Self {
            table,
            weights,
            global_filters,
            local: None,
            max_forward_depth: DEFAULT_MAX_FORWARD_DEPTH,
        }
    }

    /// In-process handlers reachable through `forward:` URIs.
    pub fn with_local_router(mut self, router: Router) -> Self {
        self.local = Some(router);
        self
    }

    pub fn with_max_forward_depth(mut self, depth: usize) -> Self {
        self.max_forward_depth = depth;
        self
    }

    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// Route and dispatch one request. Errors become responses here.
    pub async fn handle(self: &Arc<Self>, request: Request<Body>, remote: Option<SocketAddr>) -> Response {
        let start = Instant::now();
        let mut ctx = RequestContext::new(request);
        if let Some(addr) = remote {
            ctx = ctx.with_remote_addr(addr);
        }
        ctx.set_handler(self.clone());
        self.weights.apply(&mut ctx);

        let response = match self.dispatch(&mut ctx).await {
            Ok(response) => response,
            Err(e) => {
                let route_id = ctx.route().map(|r| r.id().to_string()).unwrap_or_default();
                if e.is_upstream() {
                    tracing::error!(request_id = %ctx.request_id(), route_id = %route_id, error = %e, "Upstream request failed");
                } else {
                    tracing::warn!(request_id = %ctx.request_id(), route_id = %route_id, error = %e, "Request failed");
                }
                e.into_response()
            }
        };

        let route_id = ctx.route().map(|r| r.id()).unwrap_or("none");
        metrics::record_request(route_id, response.status().as_u16(), start);
        response
    }

    async fn dispatch(&self, ctx: &mut RequestContext) -> GatewayResult<Response> {
        match self.table.lookup(ctx).await? {
            Some(route) => self.run_route(ctx, route).await,
            None => {
                tracing::warn!(request_id = %ctx.request_id(), path = %ctx.path(), "No matching route found");
                Ok(not_found())
            }
        }
    }

    async fn run_route(&self, ctx: &mut RequestContext, route: Arc<Route>) -> GatewayResult<Response> {
        let mut filters = Vec::with_capacity(self.global_filters.len() + route.filters().len());
        filters.extend(self.global_filters.iter().cloned());
        filters.extend(route.filters().iter().cloned());
        sort_filters(&mut filters);
        tracing::debug!(request_id = %ctx.request_id(), route_id = %route.id(), filters = ?filters, "Sorted gateway filters");

        ctx.set_route(route);
        FilterChain::new(&filters).next(ctx).await
    }

    /// Re-dispatch `ctx` at its current path in process.
    pub(crate) async fn forward(self: &Arc<Self>, ctx: &mut RequestContext) -> GatewayResult<Response> {
        if ctx.forward_depth() >= self.max_forward_depth {
            return Err(GatewayError::ForwardLoop(self.max_forward_depth));
        }
        ctx.enter_forward();
        ctx.clear_route();
        ctx.clear_already_routed();

        if let Some(route) = self.table.lookup(ctx).await? {
            return self.run_route(ctx, route).await;
        }
        if let Some(router) = &self.local {
            tracing::debug!(request_id = %ctx.request_id(), path = %ctx.path(), "Forwarding to local handler");
            let request = ctx.take_request()?;
            return match router.clone().oneshot(request).await {
                Ok(response) => Ok(response),
                Err(never) => match never {},
            };
        }
        tracing::warn!(request_id = %ctx.request_id(), path = %ctx.path(), "No local handler for forward");
        Ok(not_found())
    }
}

impl std::fmt::Debug for GatewayHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayHandler")
            .field("routes", &self.table.len())
            .field("global_filters", &self.global_filters)
            .field("local", &self.local.is_some())
            .field("max_forward_depth", &self.max_forward_depth)
            .finish()
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "No matching route found").into_response()
}
