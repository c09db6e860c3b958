//! API gateway routing core.
//!
//! Route definitions are compiled into predicate/filter pipelines, kept in
//! a hot-swappable table, and evaluated per request to dispatch to HTTP,
//! WebSocket or in-process targets.

// Routing core
pub mod context;
pub mod error;
pub mod filter;
pub mod handler;
pub mod predicate;
pub mod route;
pub mod weight;

// Dispatch
pub mod http;
pub mod load_balancer;
pub mod resilience;

// Cross-cutting concerns
pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use handler::GatewayHandler;
pub use lifecycle::{Gateway, Shutdown};
