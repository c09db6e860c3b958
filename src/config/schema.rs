//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::filter::retry::RetryBackoff;
use crate::resilience::CircuitBreakerConfig;
use crate::route::definition::{FilterDefinition, RouteDefinition};
use crate::weight::WeightConfig;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Route table behavior.
    pub gateway: RoutingConfig,

    /// Route definitions.
    pub routes: Vec<RouteDefinition>,

    /// Initial weight group members, in addition to `Weight` predicates.
    pub weights: Vec<WeightConfig>,

    /// Logical service id → instance addresses for `lb://` routes.
    pub services: BTreeMap<String, Vec<String>>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Policy behind the `CircuitBreaker` filter.
    pub circuit_breaker: CircuitBreakerSettings,

    /// Backoff of the `Retry` filter.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Route table settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Abort a refresh on the first bad definition instead of skipping it.
    pub fail_on_route_definition_error: bool,

    /// Seconds between periodic pulls from the definition sources.
    pub refresh_interval_secs: u64,

    /// Filters prepended to every route.
    pub default_filters: Vec<FilterDefinition>,

    /// Optional TOML file of `[[routes]]`, watched for changes.
    pub routes_file: Option<PathBuf>,

    /// Deepest allowed chain of `forward:` re-entries.
    pub max_forward_depth: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            fail_on_route_definition_error: false,
            refresh_interval_secs: 30,
            default_filters: Vec::new(),
            routes_file: None,
            max_forward_depth: 8,
        }
    }
}

impl RoutingConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Upstream response timeout in seconds.
    pub response_secs: u64,

    /// Total time for an inbound request in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            response_secs: 30,
            request_secs: 60,
        }
    }
}

/// Circuit breaker policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a probe is allowed.
    pub open_secs: u64,

    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_secs: 5,
            timeout_ms: 1000,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn policy_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            open_duration: Duration::from_secs(self.open_secs),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Retry backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let backoff = RetryBackoff::default();
        Self {
            base_delay_ms: backoff.base_delay_ms,
            max_delay_ms: backoff.max_delay_ms,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> RetryBackoff {
        RetryBackoff {
            base_delay_ms: self.base_delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it.
    pub log_level: Option<String>,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
