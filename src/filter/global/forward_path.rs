//! Gives `forward:` routes their target path before other filters run.

use async_trait::async_trait;
use axum::response::Response;

use crate::context::RequestContext;
use crate::error::GatewayResult;
use crate::filter::global::FORWARD_PATH_ORDER;
use crate::filter::{FilterChain, GatewayFilter};

#[derive(Debug)]
pub struct ForwardPathFilter;

#[async_trait]
impl GatewayFilter for ForwardPathFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let target = ctx
            .route()
            .filter(|route| route.uri().scheme() == "forward")
            .map(|route| route.uri().path().to_string());

        if let Some(path) = target {
            if !ctx.is_already_routed() && !path.is_empty() {
                ctx.set_path(&path)?;
            }
        }
        chain.next(ctx).await
    }

    fn order(&self) -> Option<i32> {
        Some(FORWARD_PATH_ORDER)
    }
}
