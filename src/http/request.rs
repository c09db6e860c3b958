//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) and echo it on the response
//! - Prepare the headers forwarded to the upstream
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - `Host` is dropped unless the route asked to preserve it; the outbound
//!   client then derives it from the upstream URL

use axum::http::header::{HeaderName, HeaderValue, HOST};
use axum::http::HeaderMap;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::context::RequestContext;
use crate::http::response::remove_hop_by_hop;

pub const X_REQUEST_ID: &str = "x-request-id";

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Sets `x-request-id` on requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Copies `x-request-id` from the request onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Headers to send upstream for this request.
pub fn upstream_headers(ctx: &RequestContext) -> HeaderMap {
    let mut headers = ctx.headers().clone();
    remove_hop_by_hop(&mut headers);

    if let Some(host) = ctx.headers().get(HOST) {
        if !headers.contains_key(&X_FORWARDED_HOST) {
            headers.insert(X_FORWARDED_HOST, host.clone());
        }
    }
    if !headers.contains_key(&X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }
    if let Some(addr) = ctx.remote_addr() {
        let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, addr.ip()),
            None => addr.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if !ctx.preserve_host() {
        headers.remove(HOST);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn ctx() -> RequestContext {
        let request = Request::builder()
            .uri("/api")
            .header(HOST, "gateway.local")
            .header("connection", "keep-alive, x-internal")
            .header("x-internal", "secret")
            .header("x-forwarded-for", "10.0.0.1")
            .header("accept", "text/plain")
            .body(Body::empty())
            .unwrap();
        RequestContext::new(request).with_remote_addr("192.168.1.5:40000".parse().unwrap())
    }

    #[test]
    fn test_upstream_headers_strip_host_and_hop_by_hop() {
        let headers = upstream_headers(&ctx());
        assert!(headers.get(HOST).is_none());
        assert!(headers.get("connection").is_none());
        assert!(headers.get("x-internal").is_none());
        assert_eq!(headers["accept"], "text/plain");
        assert_eq!(headers["x-forwarded-host"], "gateway.local");
        assert_eq!(headers["x-forwarded-for"], "10.0.0.1, 192.168.1.5");
    }

    #[test]
    fn test_preserve_host() {
        let mut ctx = ctx();
        ctx.set_preserve_host(true);
        assert_eq!(upstream_headers(&ctx)[HOST], "gateway.local");
    }
}
