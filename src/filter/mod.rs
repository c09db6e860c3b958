//! Gateway filters and the per-request filter chain.
//!
//! # Data Flow
//! ```text
//! FilterDefinition (name + args)
//!     → factory.rs (registry lookup, argument binding)
//!     → route filter (rewrite_path.rs, retry.rs, ...) tagged with its order
//!
//! Per request:
//!     global filters (global/) + matched route's filters
//!     → stable sort by order
//!     → FilterChain::next at index 0
//!     → each filter mutates ctx, short-circuits, or calls the rest of the chain
//!     → terminal filter (HTTP, WebSocket or forward dispatch)
//! ```
//!
//! # Design Decisions
//! - A chain is a borrowed slice plus an index; it is `Copy` so retry and
//!   fallback filters can run the remainder more than once
//! - Filters without an explicit order take their 1-based position in the
//!   route's filter list
//! - Running past the last filter yields an empty `200`

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;

use crate::context::RequestContext;
use crate::error::GatewayResult;

pub mod circuit_breaker;
pub mod factory;
pub mod global;
pub mod headers;
pub mod prefix_path;
pub mod retry;
pub mod rewrite_path;
pub mod strip_prefix;

pub use factory::{FilterFactory, FilterRegistry};

/// A step in the request/response processing chain.
#[async_trait]
pub trait GatewayFilter: Send + Sync + fmt::Debug {
    /// Process the request, usually by calling `chain.next(ctx)`.
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response>;

    /// Explicit order; `None` means "position in the definition".
    fn order(&self) -> Option<i32> {
        None
    }
}

/// Shared filter handle.
pub type BoxedFilter = Arc<dyn GatewayFilter>;

/// A filter tagged with the order used for sorting.
#[derive(Clone)]
pub struct OrderedFilter {
    pub order: i32,
    pub filter: BoxedFilter,
}

impl OrderedFilter {
    pub fn new(order: i32, filter: BoxedFilter) -> Self {
        Self { order, filter }
    }

    /// Use the filter's own order.
    pub fn global(filter: BoxedFilter) -> Self {
        let order = filter.order().unwrap_or(0);
        Self { order, filter }
    }
}

impl fmt::Debug for OrderedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}, order = {}]", self.filter, self.order)
    }
}

/// Stable sort by order; equal orders keep their relative position.
pub fn sort_filters(filters: &mut [OrderedFilter]) {
    filters.sort_by_key(|f| f.order);
}

/// Remainder of a filter chain, starting at `index`.
#[derive(Clone, Copy)]
pub struct FilterChain<'a> {
    filters: &'a [OrderedFilter],
    index: usize,
}

impl<'a> FilterChain<'a> {
    pub fn new(filters: &'a [OrderedFilter]) -> Self {
        Self { filters, index: 0 }
    }

    /// Invoke the filter at the current position with the rest of the chain.
    pub async fn next(self, ctx: &mut RequestContext) -> GatewayResult<Response> {
        match self.filters.get(self.index) {
            Some(current) => {
                let rest = FilterChain {
                    filters: self.filters,
                    index: self.index + 1,
                };
                current.filter.filter(ctx, rest).await
            }
            None => {
                tracing::debug!(request_id = %ctx.request_id(), "Filter chain completed without dispatch");
                Ok(Response::new(Body::empty()))
            }
        }
    }

    /// Filters left to run, including the current one.
    pub fn remaining(&self) -> usize {
        self.filters.len().saturating_sub(self.index)
    }
}

impl fmt::Debug for FilterChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("index", &self.index)
            .field("len", &self.filters.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::http::{HeaderValue, Request, StatusCode};

    /// Records its name into a shared log, then continues.
    #[derive(Debug)]
    pub(crate) struct Recording {
        pub name: &'static str,
        pub log: Arc<Mutex<Vec<&'static str>>>,
        pub order: Option<i32>,
    }

    #[async_trait]
    impl GatewayFilter for Recording {
        async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
            self.log.lock().unwrap().push(self.name);
            chain.next(ctx).await
        }

        fn order(&self) -> Option<i32> {
            self.order
        }
    }

    /// Terminal stub answering with a fixed status.
    #[derive(Debug)]
    pub(crate) struct Respond(pub StatusCode);

    #[async_trait]
    impl GatewayFilter for Respond {
        async fn filter(&self, ctx: &mut RequestContext, _chain: FilterChain<'_>) -> GatewayResult<Response> {
            ctx.begin_dispatch()?;
            let mut response = Response::new(Body::from(ctx.path().to_string()));
            *response.status_mut() = self.0;
            Ok(response)
        }
    }

    #[derive(Debug)]
    struct ShortCircuit;

    #[async_trait]
    impl GatewayFilter for ShortCircuit {
        async fn filter(&self, _ctx: &mut RequestContext, _chain: FilterChain<'_>) -> GatewayResult<Response> {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::FORBIDDEN;
            Ok(response)
        }
    }

    #[derive(Debug)]
    struct PostProcess;

    #[async_trait]
    impl GatewayFilter for PostProcess {
        async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
            let mut response = chain.next(ctx).await?;
            response.headers_mut().insert("x-post", HeaderValue::from_static("1"));
            Ok(response)
        }
    }

    pub(crate) fn ctx(uri: &str) -> RequestContext {
        RequestContext::new(Request::builder().uri(uri).body(Body::empty()).unwrap())
    }

    fn recording(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, order: i32) -> OrderedFilter {
        OrderedFilter::new(
            order,
            Arc::new(Recording {
                name,
                log: log.clone(),
                order: None,
            }),
        )
    }

    #[tokio::test]
    async fn test_stable_sort_keeps_definition_order_for_ties() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut filters = vec![
            recording("a", &log, 1),
            recording("b", &log, 0),
            recording("c", &log, 1),
            recording("d", &log, 0),
        ];
        sort_filters(&mut filters);
        FilterChain::new(&filters).next(&mut ctx("/")).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["b", "d", "a", "c"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let filters = vec![
            OrderedFilter::new(1, Arc::new(ShortCircuit)),
            recording("never", &log, 2),
        ];
        let response = FilterChain::new(&filters).next(&mut ctx("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_processing_sees_terminal_response() {
        let filters = vec![
            OrderedFilter::new(1, Arc::new(PostProcess)),
            OrderedFilter::new(i32::MAX, Arc::new(Respond(StatusCode::ACCEPTED))),
        ];
        let response = FilterChain::new(&filters).next(&mut ctx("/x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["x-post"], "1");
    }

    #[tokio::test]
    async fn test_empty_chain_returns_ok() {
        let response = FilterChain::new(&[]).next(&mut ctx("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
