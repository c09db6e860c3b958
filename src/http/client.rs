//! Outbound HTTP client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::{GatewayError, GatewayResult};

/// Sends one request to an upstream and returns its streamed response.
#[async_trait]
pub trait HttpClient: Send + Sync + fmt::Debug {
    async fn execute(&self, request: Request<Body>) -> GatewayResult<Response>;
}

/// `hyper-util` pooled client over plain TCP.
#[derive(Debug, Clone)]
pub struct HyperHttpClient {
    client: Client<HttpConnector, Body>,
    response_timeout: Duration,
}

impl HyperHttpClient {
    pub fn new(connect_timeout: Duration, response_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            response_timeout,
        }
    }
}

#[async_trait]
impl HttpClient for HyperHttpClient {
    async fn execute(&self, request: Request<Body>) -> GatewayResult<Response> {
        match tokio::time::timeout(self.response_timeout, self.client.request(request)).await {
            Err(_) => Err(GatewayError::UpstreamTimeout(self.response_timeout)),
            Ok(Err(e)) if e.is_connect() => Err(GatewayError::UpstreamUnavailable(e.to_string())),
            Ok(Err(e)) => Err(GatewayError::Upstream(e.to_string())),
            Ok(Ok(response)) => Ok(response.map(Body::new)),
        }
    }
}
