//! `Retry=3`: re-run the rest of the chain on retryable outcomes.
//!
//! Named arguments: `retries`, `statuses` (codes or names such as
//! `BAD_GATEWAY`), `series` (`5xx` by default), `methods` (`GET` by default).
//! Configuring the filter turns on body caching for its route so the
//! request body can be replayed for every attempt.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::Response;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::filter::global::cached_body::BodyCachingRoutes;
use crate::filter::{BoxedFilter, FilterChain, FilterFactory, GatewayFilter};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::retries::{RetryPolicy, StatusSeries};
use crate::route::args::BoundArgs;

/// Delay settings shared by every Retry filter.
#[derive(Debug, Clone, Copy)]
pub struct RetryBackoff {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            base_delay_ms: 50,
            max_delay_ms: 500,
        }
    }
}

#[derive(Debug)]
pub struct RetryFilter {
    policy: RetryPolicy,
    backoff: RetryBackoff,
}

impl RetryFilter {
    pub fn new(policy: RetryPolicy, backoff: RetryBackoff) -> Self {
        Self { policy, backoff }
    }

    fn should_retry(&self, outcome: &GatewayResult<Response>) -> bool {
        match outcome {
            Ok(response) => self.policy.is_retryable_status(response.status()),
            Err(e) => self.policy.is_retryable_error(e),
        }
    }
}

#[async_trait]
impl GatewayFilter for RetryFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        if !self.policy.allows_method(ctx.method()) {
            return chain.next(ctx).await;
        }

        // Later filters mutate the request in place; every attempt starts from here.
        let uri = ctx.uri().clone();
        let headers = ctx.headers().clone();
        let mut attempt = 0;

        loop {
            let outcome = chain.next(ctx).await;
            if attempt >= self.policy.retries || !self.should_retry(&outcome) {
                return outcome;
            }
            attempt += 1;

            let delay = calculate_backoff(attempt, self.backoff.base_delay_ms, self.backoff.max_delay_ms);
            match &outcome {
                Ok(response) => tracing::info!(
                    request_id = %ctx.request_id(),
                    attempt,
                    delay = ?delay,
                    status = %response.status(),
                    "Retrying request"
                ),
                Err(e) => tracing::info!(
                    request_id = %ctx.request_id(),
                    attempt,
                    delay = ?delay,
                    error = %e,
                    "Retrying after upstream error"
                ),
            }
            drop(outcome);
            tokio::time::sleep(delay).await;

            ctx.set_uri(uri.clone());
            *ctx.headers_mut() = headers.clone();
            ctx.clear_already_routed();
        }
    }
}

/// Parse `502` or `BAD_GATEWAY`.
fn parse_status(raw: &str) -> Option<StatusCode> {
    let raw = raw.trim();
    if let Ok(code) = raw.parse::<u16>() {
        return StatusCode::from_u16(code).ok();
    }
    let wanted = raw.to_ascii_uppercase();
    (100..600u16).filter_map(|code| StatusCode::from_u16(code).ok()).find(|status| {
        status
            .canonical_reason()
            .is_some_and(|reason| reason.to_ascii_uppercase().replace(|c: char| c == ' ' || c == '-', "_") == wanted)
    })
}

pub struct RetryFilterFactory {
    body_caching: Arc<BodyCachingRoutes>,
    backoff: RetryBackoff,
}

impl RetryFilterFactory {
    pub fn new(body_caching: Arc<BodyCachingRoutes>, backoff: RetryBackoff) -> Self {
        Self { body_caching, backoff }
    }
}

impl FilterFactory for RetryFilterFactory {
    fn name(&self) -> &'static str {
        "Retry"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["retries", "statuses", "series", "methods"]
    }

    fn apply(&self, route_id: &str, args: &BoundArgs) -> GatewayResult<BoxedFilter> {
        let mut policy = RetryPolicy::default();
        if let Some(retries) = args.parse::<u32>("retries")? {
            policy.retries = retries;
        }

        let statuses = args.list("statuses");
        policy.statuses = statuses
            .iter()
            .map(|s| parse_status(s).ok_or_else(|| GatewayError::binding(args.name(), format!("invalid status '{}'", s))))
            .collect::<GatewayResult<_>>()?;

        let series = args.list("series");
        if !series.is_empty() {
            policy.series = series
                .iter()
                .map(|s| {
                    StatusSeries::parse(s)
                        .ok_or_else(|| GatewayError::binding(args.name(), format!("invalid series '{}'", s)))
                })
                .collect::<GatewayResult<_>>()?;
        } else if !policy.statuses.is_empty() {
            policy.series.clear();
        }

        let methods = args.list("methods");
        if !methods.is_empty() {
            policy.methods = methods
                .iter()
                .map(|m| {
                    Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                        .map_err(|_| GatewayError::binding(args.name(), format!("invalid method '{}'", m)))
                })
                .collect::<GatewayResult<_>>()?;
        }

        self.body_caching.enable(route_id);
        tracing::debug!(route_id = %route_id, policy = ?policy, "Enabled body caching for retries");
        Ok(Arc::new(RetryFilter::new(policy, self.backoff)))
    }
}
