//! Terminal filter bridging WebSocket upgrades to a `ws`/`wss` upstream.

use async_trait::async_trait;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::FromRequestParts;
use axum::http::header::{HeaderValue, SEC_WEBSOCKET_PROTOCOL, UPGRADE};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Error as WsError;
use url::Url;

use crate::context::RequestContext;
use crate::error::{GatewayError, GatewayResult};
use crate::filter::global::WEBSOCKET_ROUTING_ORDER;
use crate::filter::{FilterChain, GatewayFilter};
use crate::http::request::upstream_headers;
use crate::http::websocket::bridge;

#[derive(Debug)]
pub struct WebsocketRoutingFilter;

pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// `ws`/`wss` URL for an upgrade request, or `None` if this filter does not apply.
pub fn websocket_url(url: &Url, headers: &HeaderMap) -> Option<Url> {
    let scheme = match url.scheme() {
        "ws" | "wss" => return Some(url.clone()),
        "http" => "ws",
        "https" => "wss",
        _ => return None,
    };
    if !is_websocket_upgrade(headers) {
        return None;
    }
    let mut converted = url.clone();
    converted.set_scheme(scheme).ok()?;
    Some(converted)
}

/// Subprotocols requested by the client, in order.
pub fn requested_protocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Forwarded headers without any `Sec-WebSocket-*` entries.
fn handshake_headers(ctx: &RequestContext) -> HeaderMap {
    let mut headers = upstream_headers(ctx);
    let handshake: Vec<_> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("sec-websocket"))
        .cloned()
        .collect();
    for name in handshake {
        headers.remove(name);
    }
    headers
}

#[async_trait]
impl GatewayFilter for WebsocketRoutingFilter {
    async fn filter(&self, ctx: &mut RequestContext, chain: FilterChain<'_>) -> GatewayResult<Response> {
        if ctx.is_already_routed() {
            return chain.next(ctx).await;
        }
        let Some(url) = ctx.request_url().and_then(|url| websocket_url(url, ctx.headers())) else {
            return chain.next(ctx).await;
        };
        ctx.set_request_url(url.clone());
        ctx.begin_dispatch()?;

        let upgrade = match WebSocketUpgrade::from_request_parts(ctx.parts_mut(), &()).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => return Ok(rejection.into_response()),
        };

        let protocols = requested_protocols(ctx.headers());
        let headers = handshake_headers(ctx);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| GatewayError::WebSocket(e.to_string()))?;
        for name in headers.keys() {
            request.headers_mut().remove(name);
        }
        for (name, value) in headers.iter() {
            request.headers_mut().append(name.clone(), value.clone());
        }
        if !protocols.is_empty() {
            let joined = HeaderValue::from_str(&protocols.join(", "))
                .map_err(|e| GatewayError::InvalidArgument(e.to_string()))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, joined);
        }

        tracing::debug!(request_id = %ctx.request_id(), url = %url, protocols = ?protocols, "Connecting upstream WebSocket");
        let (upstream, handshake) = match tokio_tungstenite::connect_async(request).await {
            Ok(connected) => connected,
            Err(WsError::Io(e)) => return Err(GatewayError::UpstreamUnavailable(e.to_string())),
            Err(e) => return Err(GatewayError::WebSocket(e.to_string())),
        };

        let selected = handshake
            .headers()
            .get(SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let upgrade = match selected {
            Some(protocol) => upgrade.protocols([protocol]),
            None => upgrade,
        };

        let request_id = ctx.request_id().to_string();
        Ok(upgrade.on_upgrade(move |socket| bridge(socket, upstream, request_id)))
    }

    fn order(&self) -> Option<i32> {
        Some(WEBSOCKET_ROUTING_ORDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn upgrade_headers() -> HeaderMap {
        let request = Request::builder()
            .uri("/chat")
            .header("host", "gateway.local")
            .header("upgrade", "websocket")
            .header("connection", "Upgrade")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .header("sec-websocket-version", "13")
            .header("sec-websocket-protocol", "chat, superchat")
            .header("sec-websocket-protocol", "v3")
            .header("x-user", "42")
            .body(Body::empty())
            .unwrap();
        request.headers().clone()
    }

    #[test]
    fn test_websocket_url() {
        let headers = upgrade_headers();
        let http = Url::parse("http://backend:9000/chat").unwrap();
        assert_eq!(websocket_url(&http, &headers).unwrap().as_str(), "ws://backend:9000/chat");

        let https = Url::parse("https://backend/chat").unwrap();
        assert_eq!(websocket_url(&https, &headers).unwrap().scheme(), "wss");

        assert!(websocket_url(&http, &HeaderMap::new()).is_none());
        assert!(websocket_url(&Url::parse("forward:/chat").unwrap(), &headers).is_none());
    }

    #[test]
    fn test_requested_protocols() {
        assert_eq!(requested_protocols(&upgrade_headers()), vec!["chat", "superchat", "v3"]);
    }

    #[test]
    fn test_handshake_headers_are_filtered() {
        let request = Request::builder().uri("/chat").body(Body::empty()).unwrap();
        let mut ctx = RequestContext::new(request);
        *ctx.headers_mut() = upgrade_headers();

        let headers = handshake_headers(&ctx);
        assert!(headers.get("host").is_none());
        assert!(headers.get("upgrade").is_none());
        assert!(headers.keys().all(|k| !k.as_str().starts_with("sec-websocket")));
        assert_eq!(headers["x-user"], "42");
    }
}
