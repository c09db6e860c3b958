//! Global filters: applied to every routed request and merged with the
//! route's own filters by order.
//!
//! # Data Flow
//! ```text
//! AdaptCachedBody     (i32::MIN + 1000) buffer the body for retry-enabled routes
//! ForwardPath         (0)               forward: routes take the target path
//!   ... route filters (1..n) ...
//! RouteToRequestUrl   (10000)           route URI + request path/query → request URL
//! LoadBalancerClient  (10100)           lb://service → concrete instance
//! WebsocketRouting    (i32::MAX - 1)    ws/wss bridge               (terminal)
//! HttpRouting         (i32::MAX)        upstream HTTP call           (terminal)
//! ForwardRouting      (i32::MAX)        in-process re-dispatch       (terminal)
//! ```
//!
//! # Design Decisions
//! - Terminal filters pass the request on when the scheme is not theirs
//!   or the request was already dispatched

use std::sync::Arc;

use crate::filter::OrderedFilter;
use crate::http::client::HttpClient;
use crate::load_balancer::ServiceResolver;

pub mod cached_body;
pub mod forward_path;
pub mod forward_routing;
pub mod http_routing;
pub mod load_balancer;
pub mod route_to_url;
pub mod websocket;

use cached_body::{AdaptCachedBodyFilter, BodyCachingRoutes};
use forward_path::ForwardPathFilter;
use forward_routing::ForwardRoutingFilter;
use http_routing::HttpRoutingFilter;
use load_balancer::LoadBalancerClientFilter;
use route_to_url::RouteToRequestUrlFilter;
use websocket::WebsocketRoutingFilter;

pub const ADAPT_CACHED_BODY_ORDER: i32 = i32::MIN + 1000;
pub const FORWARD_PATH_ORDER: i32 = 0;
pub const ROUTE_TO_URL_ORDER: i32 = 10000;
pub const LOAD_BALANCER_CLIENT_ORDER: i32 = 10100;
pub const WEBSOCKET_ROUTING_ORDER: i32 = i32::MAX - 1;
pub const HTTP_ROUTING_ORDER: i32 = i32::MAX;
pub const FORWARD_ROUTING_ORDER: i32 = i32::MAX;

/// The standard global filter set, sorted by order.
pub fn standard_filters(
    body_caching: Arc<BodyCachingRoutes>,
    resolver: Arc<dyn ServiceResolver>,
    client: Arc<dyn HttpClient>,
) -> Vec<OrderedFilter> {
    let mut filters = vec![
        OrderedFilter::global(Arc::new(AdaptCachedBodyFilter::new(body_caching))),
        OrderedFilter::global(Arc::new(ForwardPathFilter)),
        OrderedFilter::global(Arc::new(RouteToRequestUrlFilter)),
        OrderedFilter::global(Arc::new(LoadBalancerClientFilter::new(resolver))),
        OrderedFilter::global(Arc::new(WebsocketRoutingFilter)),
        OrderedFilter::global(Arc::new(HttpRoutingFilter::new(client))),
        OrderedFilter::global(Arc::new(ForwardRoutingFilter)),
    ];
    crate::filter::sort_filters(&mut filters);
    filters
}
