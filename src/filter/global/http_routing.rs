//! Terminal filter issuing the upstream HTTP call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Request, Uri};
use axum::response::Response;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::filter::global::HTTP_ROUTING_ORDER;
use crate::filter::{FilterChain, GatewayFilter};
use crate::http::client::HttpClient;
use crate::http::request::upstream_headers;
use crate::http::response::remove_hop_by_hop;
use crate::resilience::timeouts::with_deadline;
use crate::route::Route;

/// Route metadata key holding a per-route response timeout in milliseconds.
pub const RESPONSE_TIMEOUT_KEY: &str = "response-timeout";

#[derive(Debug)]
pub struct HttpRoutingFilter {
    client: Arc<dyn HttpClient>,
}

impl HttpRoutingFilter {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

fn response_timeout(route: Option<&Arc<Route>>) -> Option<Duration> {
    route?
        .metadata()
        .get(RESPONSE_TIMEOUT_KEY)?
        .as_u64()
        .map(Duration::from_millis)
}

#[async_trait]
impl GatewayFilter for HttpRoutingFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let Some(url) = ctx.request_url().cloned() else {
            return chain.next(ctx).await;
        };
        if ctx.is_already_routed() || !matches!(url.scheme(), "http" | "https") {
            return chain.next(ctx).await;
        }
        ctx.begin_dispatch()?;

        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| GatewayError::InvalidArgument(format!("invalid upstream url '{}': {}", url, e)))?;
        let mut builder = Request::builder().method(ctx.method().clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = upstream_headers(ctx);
        }
        let request = builder
            .body(ctx.take_body()?)
            .map_err(|e| GatewayError::InvalidArgument(e.to_string()))?;

        tracing::debug!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            url = %url,
            "Dispatching to upstream"
        );

        let mut response = match response_timeout(ctx.route()) {
            Some(deadline) => with_deadline(deadline, self.client.execute(request)).await?,
            None => self.client.execute(request).await?,
        };
        remove_hop_by_hop(response.headers_mut());
        Ok(response)
    }

    fn order(&self) -> Option<i32> {
        Some(HTTP_ROUTING_ORDER)
    }
}
