//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0)
//! - Check addresses parse (listeners, service instances)
//! - Detect empty and duplicate route ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Predicate and filter names are not checked here; the route compiler
//!   reports them per route under the configured error policy

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::load_balancer::static_resolver::parse_instance;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route at index {0} has an empty id")]
    EmptyRouteId(usize),

    #[error("duplicate route id '{0}'")]
    DuplicateRouteId(String),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("{field} is not a valid socket address: '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid service instance: {0}")]
    InvalidService(String),

    #[error("weight entry {0} needs a group and a route id")]
    IncompleteWeight(usize),

    #[error("retries.base_delay_ms must not exceed retries.max_delay_ms")]
    BackoffRange,
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        if route.id.trim().is_empty() {
            errors.push(ValidationError::EmptyRouteId(index));
        } else if !seen.insert(route.id.as_str()) {
            errors.push(ValidationError::DuplicateRouteId(route.id.clone()));
        }
    }

    let positive = [
        ("listener.max_connections", config.listener.max_connections as u64),
        ("gateway.refresh_interval_secs", config.gateway.refresh_interval_secs),
        ("gateway.max_forward_depth", config.gateway.max_forward_depth as u64),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.response_secs", config.timeouts.response_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("circuit_breaker.failure_threshold", u64::from(config.circuit_breaker.failure_threshold)),
        ("circuit_breaker.timeout_ms", config.circuit_breaker.timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::NotPositive(field));
        }
    }

    let mut addresses = vec![("listener.bind_address", &config.listener.bind_address)];
    if config.admin.enabled {
        addresses.push(("admin.bind_address", &config.admin.bind_address));
    }
    if config.observability.metrics_enabled {
        addresses.push(("observability.metrics_address", &config.observability.metrics_address));
    }
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.clone(),
            });
        }
    }

    for (service_id, instances) in &config.services {
        for address in instances {
            if let Err(e) = parse_instance(service_id, address) {
                errors.push(ValidationError::InvalidService(e.to_string()));
            }
        }
    }

    for (index, weight) in config.weights.iter().enumerate() {
        if weight.group.trim().is_empty() || weight.route_id.trim().is_empty() {
            errors.push(ValidationError::IncompleteWeight(index));
        }
    }

    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::BackoffRange);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
