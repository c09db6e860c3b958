//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! CircuitBreaker route filter:
//!     → ResiliencePolicy::execute(command, rest of chain)
//!     → circuit_breaker.rs (short-circuit while open, deadline, failure count)
//!     → PolicyFailure on timeout / open circuit / failed call
//!     → fallback dispatch or mapped GatewayError
//!
//! Retry route filter:
//!     → retries.rs (which outcomes are retryable)
//!     → backoff.rs (jittered exponential delay between attempts)
//! ```
//!
//! # Design Decisions
//! - The policy is a trait so another breaker implementation can be plugged in
//! - Only errors count as failures; an upstream 5xx response is a success
//!   for the breaker and a retry candidate for the Retry filter
//! - Timing out drops the primary future, cancelling the upstream call

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use thiserror::Error;

use crate::error::{GatewayError, GatewayResult};

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerPolicy};

/// The protected call: the remainder of a filter chain.
pub type PrimaryCall<'a> = Pin<Box<dyn Future<Output = GatewayResult<Response>> + Send + 'a>>;

/// Why a protected call did not produce a response.
#[derive(Debug, Error)]
pub enum PolicyFailure {
    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("circuit is open")]
    ShortCircuit,

    #[error("command failed: {0}")]
    CommandException(GatewayError),
}

impl PolicyFailure {
    /// Error surfaced to the client when no fallback is configured.
    pub fn into_gateway_error(self, command: &str) -> GatewayError {
        match self {
            PolicyFailure::Timeout(after) => GatewayError::UpstreamTimeout(after),
            PolicyFailure::ShortCircuit => {
                GatewayError::UpstreamUnavailable(format!("circuit '{}' is open", command))
            }
            PolicyFailure::CommandException(e) => e,
        }
    }
}

/// Pluggable wrapper around an upstream call.
#[async_trait]
pub trait ResiliencePolicy: Send + Sync + fmt::Debug {
    async fn execute<'a>(&self, command: &str, primary: PrimaryCall<'a>) -> Result<Response, PolicyFailure>;
}
