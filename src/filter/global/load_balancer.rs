//! Resolves `lb://service` request URLs to a concrete instance.

use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use url::{Position, Url};

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::filter::global::LOAD_BALANCER_CLIENT_ORDER;
use crate::filter::{FilterChain, GatewayFilter};
use crate::load_balancer::{ServiceInstance, ServiceResolver};

#[derive(Debug)]
pub struct LoadBalancerClientFilter {
    resolver: Arc<dyn ServiceResolver>,
}

impl LoadBalancerClientFilter {
    pub fn new(resolver: Arc<dyn ServiceResolver>) -> Self {
        Self { resolver }
    }
}

/// Rebuild `url` against `instance`, keeping path and query.
///
/// An `lb` scheme becomes the instance's scheme; any other scheme (from an
/// `lb:` prefix, e.g. `ws`) is kept.
pub fn reconstruct(url: &Url, instance: &ServiceInstance) -> GatewayResult<Url> {
    let scheme = if url.scheme() == "lb" {
        instance.scheme()
    } else {
        url.scheme()
    };
    let rebuilt = format!("{}://{}{}", scheme, instance.authority(), &url[Position::BeforePath..]);
    Url::parse(&rebuilt).map_err(|e| GatewayError::InvalidArgument(format!("invalid url '{}': {}", rebuilt, e)))
}

#[async_trait]
impl GatewayFilter for LoadBalancerClientFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let Some(url) = ctx.request_url().cloned() else {
            return chain.next(ctx).await;
        };
        if url.scheme() != "lb" && ctx.scheme_prefix() != Some("lb") {
            return chain.next(ctx).await;
        }

        let service_id = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| GatewayError::InvalidHost(url.to_string()))?;
        tracing::trace!(request_id = %ctx.request_id(), url = %url, "LoadBalancerClientFilter url before");

        let instance = self
            .resolver
            .choose(service_id)
            .await
            .ok_or_else(|| GatewayError::UpstreamUnavailable(format!("Unable to find instance for {}", service_id)))?;

        let resolved = reconstruct(&url, &instance)?;
        tracing::trace!(request_id = %ctx.request_id(), url = %resolved, "LoadBalancerClientFilter url chosen");
        ctx.set_request_url(resolved);
        chain.next(ctx).await
    }

    fn order(&self) -> Option<i32> {
        Some(LOAD_BALANCER_CLIENT_ORDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    use crate::filter::tests::{ctx, Respond};
    use crate::filter::OrderedFilter;
    use crate::load_balancer::StaticServiceResolver;

    fn instance(secure: bool) -> ServiceInstance {
        ServiceInstance {
            service_id: "users".into(),
            host: "10.0.0.7".into(),
            port: 8080,
            secure,
        }
    }

    #[test]
    fn test_reconstruct() {
        let lb = Url::parse("lb://users/api/list?page=2").unwrap();
        assert_eq!(
            reconstruct(&lb, &instance(false)).unwrap().as_str(),
            "http://10.0.0.7:8080/api/list?page=2"
        );
        assert_eq!(reconstruct(&lb, &instance(true)).unwrap().scheme(), "https");

        let ws = Url::parse("ws://users/chat").unwrap();
        assert_eq!(reconstruct(&ws, &instance(false)).unwrap().as_str(), "ws://10.0.0.7:8080/chat");
    }

    #[tokio::test]
    async fn test_unknown_service_is_unavailable() {
        let filters = vec![
            OrderedFilter::global(Arc::new(LoadBalancerClientFilter::new(Arc::new(
                StaticServiceResolver::new(),
            )))),
            OrderedFilter::new(i32::MAX, Arc::new(Respond(StatusCode::OK))),
        ];
        let mut ctx = ctx("/x");
        ctx.set_request_url(Url::parse("lb://missing/x").unwrap());

        let result = FilterChain::new(&filters).next(&mut ctx).await;
        assert!(matches!(result, Err(GatewayError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_non_lb_passes_through() {
        let filters = vec![
            OrderedFilter::global(Arc::new(LoadBalancerClientFilter::new(Arc::new(
                StaticServiceResolver::new(),
            )))),
            OrderedFilter::new(i32::MAX, Arc::new(Respond(StatusCode::OK))),
        ];
        let mut ctx = ctx("/x");
        ctx.set_request_url(Url::parse("http://backend/x").unwrap());

        let response = FilterChain::new(&filters).next(&mut ctx).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(ctx.request_url().unwrap().as_str(), "http://backend/x");
    }
}
