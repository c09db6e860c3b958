//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router dispatching every path to the gateway handler
//! - Wire up middleware (tracing, timeout, request ID, in-flight limit)
//! - Serve with connect info until the shutdown signal

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ListenerConfig, TimeoutConfig};
use crate::handler::GatewayHandler;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<GatewayHandler>,
}

/// HTTP server in front of the gateway handler.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(handler: Arc<GatewayHandler>, listener: &ListenerConfig, timeouts: &TimeoutConfig) -> Self {
        let router = Self::build_router(
            AppState { handler },
            Duration::from_secs(timeouts.request_secs),
            listener.max_connections,
        );
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState, request_timeout: Duration, max_in_flight: usize) -> Router {
        let permits = Arc::new(Semaphore::new(max_in_flight));
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(middleware::from_fn_with_state(permits, limit_in_flight))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    state.handler.handle(request, remote).await
}

/// Hold a permit for the lifetime of the request; waits when none is free.
async fn limit_in_flight(State(permits): State<Arc<Semaphore>>, request: Request<Body>, next: Next) -> Response {
    match permits.acquire().await {
        Ok(_permit) => next.run(request).await,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    use crate::route::RouteTable;
    use crate::weight::WeightCalculator;

    fn router() -> Router {
        let handler = GatewayHandler::new(
            Arc::new(RouteTable::new()),
            Arc::new(WeightCalculator::new()),
            Vec::new(),
        );
        GatewayServer::build_router(
            AppState {
                handler: Arc::new(handler),
            },
            Duration::from_secs(5),
            4,
        )
    }

    #[tokio::test]
    async fn test_unrouted_request_gets_404_and_request_id() {
        let response = router()
            .oneshot(Request::get("/nothing/here").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_existing_request_id_is_kept() {
        let response = router()
            .oneshot(
                Request::get("/")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }
}
