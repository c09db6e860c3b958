//! Terminal filter for `forward:` URLs: re-enters the gateway in process.

use async_trait::async_trait;
use axum::response::Response;

use crate::context::RequestContext;
use crate::error::GatewayResult;
use crate::filter::global::FORWARD_ROUTING_ORDER;
use crate::filter::{FilterChain, GatewayFilter};

#[derive(Debug)]
pub struct ForwardRoutingFilter;

#[async_trait]
impl GatewayFilter for ForwardRoutingFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let is_forward = ctx.request_url().is_some_and(|url| url.scheme() == "forward");
        if !is_forward || ctx.is_already_routed() {
            return chain.next(ctx).await;
        }
        let Some(handler) = ctx.handler() else {
            return chain.next(ctx).await;
        };

        ctx.begin_dispatch()?;
        tracing::trace!(request_id = %ctx.request_id(), path = %ctx.path(), "Forwarding");
        handler.forward(ctx).await
    }

    fn order(&self) -> Option<i32> {
        Some(FORWARD_ROUTING_ORDER)
    }
}
