//! Merges the matched route's URI with the inbound path and query.

use async_trait::async_trait;
use axum::http::Uri;
use axum::response::Response;
use url::Url;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::filter::global::ROUTE_TO_URL_ORDER;
use crate::filter::{FilterChain, GatewayFilter};

/// True if `text` starts with `scheme:`.
fn has_scheme(text: &str) -> bool {
    let Some((scheme, _)) = text.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

/// Request URL for `request` sent to `route_uri`.
///
/// A route URI like `lb:ws://service` embeds a second scheme: the outer one
/// is returned as the scheme prefix and the inner URI is used for merging.
pub fn resolve(request: &Uri, route_uri: &Url) -> GatewayResult<(Option<String>, Url)> {
    let (prefix, target) = if route_uri.cannot_be_a_base() && has_scheme(route_uri.path()) {
        let inner = Url::parse(route_uri.path())
            .map_err(|e| GatewayError::InvalidArgument(format!("invalid route uri '{}': {}", route_uri, e)))?;
        (Some(route_uri.scheme().to_string()), inner)
    } else {
        (None, route_uri.clone())
    };

    let host = target.host_str().filter(|h| !h.is_empty());
    if target.scheme().eq_ignore_ascii_case("lb") && host.is_none() {
        return Err(GatewayError::InvalidHost(target.to_string()));
    }

    let path_and_query = request.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let merged = match host {
        Some(host) => {
            let port = target.port().map(|p| format!(":{}", p)).unwrap_or_default();
            format!("{}://{}{}{}", target.scheme(), host, port, path_and_query)
        }
        None => format!("{}:{}", target.scheme(), path_and_query),
    };
    let url = Url::parse(&merged)
        .map_err(|e| GatewayError::InvalidArgument(format!("invalid request url '{}': {}", merged, e)))?;
    Ok((prefix, url))
}

#[derive(Debug)]
pub struct RouteToRequestUrlFilter;

#[async_trait]
impl GatewayFilter for RouteToRequestUrlFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        let Some(route_uri) = ctx.route().map(|route| route.uri().clone()) else {
            return chain.next(ctx).await;
        };

        let (prefix, url) = resolve(ctx.uri(), &route_uri)?;
        tracing::trace!(request_id = %ctx.request_id(), url = %url, "RouteToRequestUrlFilter start");
        if let Some(prefix) = prefix {
            ctx.set_scheme_prefix(prefix);
        }
        ctx.set_request_url(url);
        chain.next(ctx).await
    }

    fn order(&self) -> Option<i32> {
        Some(ROUTE_TO_URL_ORDER)
    }
}
