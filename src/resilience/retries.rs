//! Retry classification.
//!
//! # Design Decisions
//! - Only configured methods are retried (GET by default)
//! - Upstream connection errors and timeouts are always retryable
//! - A response is retryable when its status is listed explicitly or falls
//!   into a listed series (5xx by default)

use axum::http::{Method, StatusCode};

use crate::error::GatewayError;

/// Status class, `1xx` through `5xx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSeries {
    Informational,
    Successful,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusSeries {
    pub fn of(status: StatusCode) -> Self {
        match status.as_u16() / 100 {
            1 => StatusSeries::Informational,
            2 => StatusSeries::Successful,
            3 => StatusSeries::Redirection,
            4 => StatusSeries::ClientError,
            _ => StatusSeries::ServerError,
        }
    }

    /// Accepts `SERVER_ERROR`, `server_error`, `5xx` or `5`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "INFORMATIONAL" | "1XX" | "1" => Some(StatusSeries::Informational),
            "SUCCESSFUL" | "2XX" | "2" => Some(StatusSeries::Successful),
            "REDIRECTION" | "3XX" | "3" => Some(StatusSeries::Redirection),
            "CLIENT_ERROR" | "4XX" | "4" => Some(StatusSeries::ClientError),
            "SERVER_ERROR" | "5XX" | "5" => Some(StatusSeries::ServerError),
            _ => None,
        }
    }
}

/// What the Retry filter retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retries: u32,
    pub statuses: Vec<StatusCode>,
    pub series: Vec<StatusSeries>,
    pub methods: Vec<Method>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            statuses: Vec::new(),
            series: vec![StatusSeries::ServerError],
            methods: vec![Method::GET],
        }
    }
}

impl RetryPolicy {
    pub fn allows_method(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.statuses.contains(&status) || self.series.contains(&StatusSeries::of(status))
    }

    pub fn is_retryable_error(&self, error: &GatewayError) -> bool {
        error.is_upstream()
    }
}
