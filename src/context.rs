//! Per-request context.
//!
//! # Responsibilities
//! - Own the inbound request (head + streamed body) for one request
//! - Carry routing attributes: matched route, resolved upstream URL,
//!   dispatch guard, weight selections, cached body
//!
//! # Design Decisions
//! - Exclusively owned by the request's task; filters receive `&mut`
//! - The body stays streamed until something asks for it to be cached
//! - The dispatch guard is only cleared by retry and fallback paths

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, request, Extensions, HeaderMap, Method, Request, Uri};
use bytes::Bytes;
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::handler::GatewayHandler;
use crate::route::Route;

/// Largest body the caching filter will buffer.
pub const MAX_CACHED_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Mutable state of one in-flight request.
pub struct RequestContext {
    parts: request::Parts,
    body: Option<Body>,
    cached_body: Option<Bytes>,
    /// Set when reading the live body failed; the stream is gone.
    body_error: Option<String>,
    remote_addr: Option<SocketAddr>,
    route: Option<Arc<Route>>,
    request_url: Option<Url>,
    scheme_prefix: Option<String>,
    original_urls: Vec<Uri>,
    already_routed: bool,
    weights: HashMap<String, String>,
    uri_template_vars: HashMap<String, String>,
    preserve_host: bool,
    forward_depth: usize,
    handler: Option<Arc<GatewayHandler>>,
    attributes: Extensions,
}

impl RequestContext {
    pub fn new(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            parts,
            body: Some(body),
            cached_body: None,
            body_error: None,
            remote_addr: None,
            route: None,
            request_url: None,
            scheme_prefix: None,
            original_urls: Vec::new(),
            already_routed: false,
            weights: HashMap::new(),
            uri_template_vars: HashMap::new(),
            preserve_host: false,
            forward_depth: 0,
            handler: None,
            attributes: Extensions::new(),
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    // --- Request head ---

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn parts(&self) -> &request::Parts {
        &self.parts
    }

    pub(crate) fn parts_mut(&mut self) -> &mut request::Parts {
        &mut self.parts
    }

    /// Value of the `x-request-id` header, or `"unknown"`.
    pub fn request_id(&self) -> &str {
        self.parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }

    /// Replace the request URI.
    pub fn set_uri(&mut self, uri: Uri) {
        self.parts.uri = uri;
    }

    /// Replace the request path, keeping scheme, authority and query.
    pub fn set_path(&mut self, path: &str) -> GatewayResult<()> {
        let path_and_query = match self.parts.uri.query() {
            Some(q) => format!("{}?{}", path, q),
            None => path.to_string(),
        };
        let mut uri_parts = self.parts.uri.clone().into_parts();
        uri_parts.path_and_query = Some(
            path_and_query
                .parse()
                .map_err(|e| GatewayError::InvalidArgument(format!("invalid path '{}': {}", path, e)))?,
        );
        self.parts.uri = Uri::from_parts(uri_parts)
            .map_err(|e| GatewayError::InvalidArgument(format!("invalid path '{}': {}", path, e)))?;
        Ok(())
    }

    // --- Body ---

    /// Read and buffer the full body once; later calls return the buffer.
    ///
    /// A declared length over [`MAX_CACHED_BODY_BYTES`] is rejected before
    /// anything is read. A failed read is remembered: the stream is lost,
    /// so every later body access fails too.
    pub async fn cache_body(&mut self) -> GatewayResult<Bytes> {
        if let Some(bytes) = &self.cached_body {
            return Ok(bytes.clone());
        }
        if let Some(reason) = &self.body_error {
            return Err(GatewayError::Body(reason.clone()));
        }
        if self.content_length().is_some_and(|len| len > MAX_CACHED_BODY_BYTES as u64) {
            return Err(GatewayError::PayloadTooLarge(MAX_CACHED_BODY_BYTES));
        }
        let Some(body) = self.body.take() else {
            return Err(GatewayError::Body("request body was already consumed".into()));
        };
        match axum::body::to_bytes(body, MAX_CACHED_BODY_BYTES).await {
            Ok(bytes) => {
                self.cached_body = Some(bytes.clone());
                Ok(bytes)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(request_id = %self.request_id(), error = %reason, "Request body read failed");
                self.body_error = Some(reason.clone());
                Err(GatewayError::Body(reason))
            }
        }
    }

    fn content_length(&self) -> Option<u64> {
        self.parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn cached_body(&self) -> Option<&Bytes> {
        self.cached_body.as_ref()
    }

    /// Body to send upstream: a replay of the cache if present, else the
    /// live stream. Fails when an earlier read lost the stream.
    pub fn take_body(&mut self) -> GatewayResult<Body> {
        if let Some(bytes) = &self.cached_body {
            return Ok(Body::from(bytes.clone()));
        }
        if let Some(reason) = &self.body_error {
            return Err(GatewayError::Body(reason.clone()));
        }
        Ok(self.body.take().unwrap_or_else(Body::empty))
    }

    // --- Routing attributes ---

    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    pub fn set_route(&mut self, route: Arc<Route>) {
        self.route = Some(route);
    }

    /// Forget the matched route and its resolved target.
    pub(crate) fn clear_route(&mut self) {
        self.route = None;
        self.request_url = None;
        self.scheme_prefix = None;
    }

    pub fn request_url(&self) -> Option<&Url> {
        self.request_url.as_ref()
    }

    pub fn set_request_url(&mut self, url: Url) {
        self.request_url = Some(url);
    }

    pub fn scheme_prefix(&self) -> Option<&str> {
        self.scheme_prefix.as_deref()
    }

    pub fn set_scheme_prefix(&mut self, prefix: impl Into<String>) {
        self.scheme_prefix = Some(prefix.into());
    }

    /// URIs the request had before path rewrites, oldest first.
    pub fn original_urls(&self) -> &[Uri] {
        &self.original_urls
    }

    pub fn add_original_url(&mut self, uri: Uri) {
        self.original_urls.push(uri);
    }

    pub fn weights(&self) -> &HashMap<String, String> {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.weights
    }

    pub fn uri_template_vars(&self) -> &HashMap<String, String> {
        &self.uri_template_vars
    }

    pub fn uri_template_vars_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.uri_template_vars
    }

    pub fn preserve_host(&self) -> bool {
        self.preserve_host
    }

    pub fn set_preserve_host(&mut self, preserve: bool) {
        self.preserve_host = preserve;
    }

    /// Free-form typed attributes for extension filters.
    pub fn attributes(&self) -> &Extensions {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Extensions {
        &mut self.attributes
    }

    // --- Dispatch guard ---

    pub fn is_already_routed(&self) -> bool {
        self.already_routed
    }

    /// Claim the request for a terminal filter.
    pub fn begin_dispatch(&mut self) -> GatewayResult<()> {
        if self.already_routed {
            return Err(GatewayError::AlreadyDispatched);
        }
        self.already_routed = true;
        Ok(())
    }

    /// Reset the guard so dispatch can restart. Retry and fallback only.
    pub fn clear_already_routed(&mut self) {
        self.already_routed = false;
    }

    // --- Re-entry ---

    pub(crate) fn handler(&self) -> Option<Arc<GatewayHandler>> {
        self.handler.clone()
    }

    pub(crate) fn set_handler(&mut self, handler: Arc<GatewayHandler>) {
        self.handler = Some(handler);
    }

    pub(crate) fn forward_depth(&self) -> usize {
        self.forward_depth
    }

    pub(crate) fn enter_forward(&mut self) {
        self.forward_depth += 1;
    }

    /// Rebuild an inbound request from this context, consuming the body.
    /// Attributes travel as request extensions.
    pub(crate) fn take_request(&mut self) -> GatewayResult<Request<Body>> {
        let body = self.take_body()?;
        let mut builder = Request::builder()
            .method(self.parts.method.clone())
            .uri(self.parts.uri.clone())
            .version(self.parts.version);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.parts.headers.clone();
        }
        let mut request = builder.body(body).unwrap_or_default();
        let mut extensions = self.parts.extensions.clone();
        extensions.extend(self.attributes.clone());
        *request.extensions_mut() = extensions;
        Ok(request)
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("route", &self.route.as_ref().map(|r| r.id()))
            .field("request_url", &self.request_url.as_ref().map(Url::as_str))
            .field("already_routed", &self.already_routed)
            .field("weights", &self.weights)
            .finish()
    }
}
