//! `CircuitBreaker=myCommand, forward:/fallback`
//!
//! Runs the rest of the chain through the configured [`ResiliencePolicy`].
//! On failure the request is re-dispatched to the fallback path, if any;
//! otherwise timeouts surface as `UpstreamTimeout` and an open circuit as
//! `UpstreamUnavailable`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Uri;
use axum::response::Response;
use url::Url;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::filter::{BoxedFilter, FilterChain, FilterFactory, GatewayFilter};
use crate::resilience::{PolicyFailure, ResiliencePolicy};
use crate::route::args::BoundArgs;

/// Request attribute describing why the fallback was taken.
#[derive(Debug, Clone)]
pub struct ExecutionFailure(pub String);

#[derive(Debug)]
pub struct CircuitBreakerFilter {
    name: String,
    fallback: Option<Url>,
    policy: Arc<dyn ResiliencePolicy>,
}

impl CircuitBreakerFilter {
    pub fn new(name: impl Into<String>, fallback: Option<Url>, policy: Arc<dyn ResiliencePolicy>) -> Self {
        Self {
            name: name.into(),
            fallback,
            policy,
        }
    }

    async fn dispatch_fallback(
        &self,
        ctx: &mut RequestContext,
        fallback: &Url,
        failure: PolicyFailure,
    ) -> GatewayResult<Response> {
        let Some(handler) = ctx.handler() else {
            return Err(failure.into_gateway_error(&self.name));
        };
        tracing::warn!(
            request_id = %ctx.request_id(),
            command = %self.name,
            fallback = %fallback,
            reason = %failure,
            "Dispatching to fallback"
        );

        let query = fallback.query().or(ctx.query()).map(str::to_string);
        let target = match query {
            Some(q) => format!("{}?{}", fallback.path(), q),
            None => fallback.path().to_string(),
        };
        let uri: Uri = target
            .parse()
            .map_err(|e| GatewayError::InvalidArgument(format!("invalid fallback uri '{}': {}", target, e)))?;

        let original = ctx.uri().clone();
        ctx.add_original_url(original);
        ctx.set_uri(uri);
        ctx.attributes_mut().insert(ExecutionFailure(failure.to_string()));
        handler.forward(ctx).await
    }
}

#[async_trait]
impl GatewayFilter for CircuitBreakerFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let outcome = self.policy.execute(&self.name, Box::pin(chain.next(ctx))).await;
        match outcome {
            Ok(response) => Ok(response),
            Err(failure) => match &self.fallback {
                Some(fallback) => self.dispatch_fallback(ctx, fallback, failure).await,
                None => Err(failure.into_gateway_error(&self.name)),
            },
        }
    }
}

pub struct CircuitBreakerFilterFactory {
    policy: Arc<dyn ResiliencePolicy>,
}

impl CircuitBreakerFilterFactory {
    pub fn new(policy: Arc<dyn ResiliencePolicy>) -> Self {
        Self { policy }
    }
}

impl FilterFactory for CircuitBreakerFilterFactory {
    fn name(&self) -> &'static str {
        "CircuitBreaker"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["name", "fallbackUri"]
    }

    fn apply(&self, route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedFilter> {
        let name = match args.optional("name").map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => route_id.to_string(),
        };
        let fallback = args
            .optional("fallbackUri")
            .map(|raw| {
                let url = Url::parse(raw.trim())
                    .map_err(|e| GatewayError::binding(args.name(), format!("invalid fallbackUri '{}': {}", raw, e)))?;
                if url.scheme() != "forward" {
                    return Err(GatewayError::binding(
                        args.name(),
                        format!("only 'forward' fallback URIs are supported, found {}", raw),
                    ));
                }
                Ok(url)
            })
            .transpose()?;
        Ok(Arc::new(CircuitBreakerFilter::new(name, fallback, self.policy.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::http::StatusCode;

    use crate::filter::factory::tests::test_deps;
    use crate::filter::tests::{ctx, Respond};
    use crate::filter::OrderedFilter;
    use crate::resilience::{CircuitBreakerConfig, CircuitBreakerPolicy};
    use crate::route::args::{Args, ShortcutType};

    #[derive(Debug)]
    struct Hang;

    #[async_trait]
    impl GatewayFilter for Hang {
        async fn filter(&self, _ctx: &mut RequestContext, _chain: FilterChain<'_>) -> GatewayResult<Response> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Err(GatewayError::Upstream("unreachable".into()))
        }
    }

    fn policy() -> Arc<dyn ResiliencePolicy> {
        Arc::new(CircuitBreakerPolicy::new(CircuitBreakerConfig {
            failure_threshold: 1,
            open_duration: Duration::from_secs(60),
            timeout: Duration::from_millis(20),
        }))
    }

    #[tokio::test]
    async fn test_timeout_then_open_without_fallback() {
        let policy = policy();
        let filters = vec![
            OrderedFilter::new(1, Arc::new(CircuitBreakerFilter::new("slow", None, policy))),
            OrderedFilter::new(2, Arc::new(Hang)),
        ];
        let chain = FilterChain::new(&filters);

        let first = chain.next(&mut ctx("/")).await.unwrap_err();
        assert!(matches!(first, GatewayError::UpstreamTimeout(_)));

        let second = chain.next(&mut ctx("/")).await.unwrap_err();
        assert!(matches!(second, GatewayError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let filters = vec![
            OrderedFilter::new(1, Arc::new(CircuitBreakerFilter::new("ok", None, policy()))),
            OrderedFilter::new(2, Arc::new(Respond(StatusCode::CREATED))),
        ];
        let response = FilterChain::new(&filters).next(&mut ctx("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_fallback_must_be_forward() {
        let factory = CircuitBreakerFilterFactory::new(test_deps().resilience);
        let bind = |shortcut: &str| {
            BoundArgs::bind("CircuitBreaker", &Args::from_shortcut(shortcut), factory.fields(), ShortcutType::Default)
                .unwrap()
        };

        assert!(factory.apply("r", &bind("cmd, forward:/fallback")).is_ok());
        assert!(matches!(
            factory.apply("r", &bind("cmd, http://example.org/fallback")),
            Err(GatewayError::BindingFailure { .. })
        ));
    }
}
