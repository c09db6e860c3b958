//! Gateway error taxonomy.
//!
//! # Design Decisions
//! - One error type for compilation, table maintenance and dispatch
//! - Compilation errors are scoped to a single route; the refresh policy
//!   decides whether they abort the whole refresh
//! - Every kind maps to the nearest standard HTTP status

use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised while compiling routes or dispatching requests.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Bad or missing route id, malformed shortcut arguments, bad URI.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Predicate or filter name not present in its registry.
    #[error("Unable to find {kind} factory with name {name}")]
    UnknownFactory { kind: &'static str, name: String },

    /// Arguments could not be bound into the factory configuration.
    #[error("Failed to bind arguments for {name}: {reason}")]
    BindingFailure { name: String, reason: String },

    /// Lookup or removal of an unknown route id.
    #[error("RouteDefinition not found: {0}")]
    NotFound(String),

    /// Load-balanced URI without a host.
    #[error("Invalid host: {0}")]
    InvalidHost(String),

    /// Upstream did not answer within its deadline.
    #[error("Upstream timed out after {0:?}")]
    UpstreamTimeout(Duration),

    /// Upstream refused the connection or the circuit is open.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream call failed after the connection was made.
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    /// A terminal filter ran twice for the same request.
    #[error("Request was already dispatched")]
    AlreadyDispatched,

    /// Reading the inbound request body failed.
    #[error("Failed to read request body: {0}")]
    Body(String),

    /// The declared request body exceeds what the gateway buffers.
    #[error("Request body larger than {0} bytes")]
    PayloadTooLarge(usize),

    /// Upstream WebSocket handshake failed.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// A definition source could not produce definitions.
    #[error("Route definition source failed: {0}")]
    DefinitionSource(String),

    /// Forward re-entry went deeper than allowed.
    #[error("Forward dispatch exceeded depth {0}")]
    ForwardLoop(usize),
}

/// Result alias used throughout the gateway.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub(crate) fn binding(name: impl Into<String>, reason: impl Into<String>) -> Self {
        GatewayError::BindingFailure {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status reported to the client for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidArgument(_) | GatewayError::Body(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream(_) | GatewayError::WebSocket(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UnknownFactory { .. }
            | GatewayError::BindingFailure { .. }
            | GatewayError::InvalidHost(_)
            | GatewayError::AlreadyDispatched
            | GatewayError::DefinitionSource(_)
            | GatewayError::ForwardLoop(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the inbound request itself can no longer be served, so
    /// route evaluation must stop instead of trying the next route.
    pub fn is_request_error(&self) -> bool {
        matches!(self, GatewayError::Body(_) | GatewayError::PayloadTooLarge(_))
    }

    /// True for failures of the upstream call itself.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            GatewayError::UpstreamTimeout(_)
                | GatewayError::UpstreamUnavailable(_)
                | GatewayError::Upstream(_)
                | GatewayError::WebSocket(_)
        )
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = Response::new(Body::from(self.to_string()));
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::UpstreamTimeout(Duration::from_secs(1)).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GatewayError::UpstreamUnavailable("open".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(GatewayError::NotFound("r1".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::InvalidHost("lb:///x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unknown_factory_message() {
        let err = GatewayError::UnknownFactory {
            kind: "predicate",
            name: "Nope".into(),
        };
        assert_eq!(err.to_string(), "Unable to find predicate factory with name Nope");
    }
}
