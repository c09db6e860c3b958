//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → startup wires subsystems from it
//!
//! Routes file (optional, gateway.routes_file):
//!     watcher.rs detects change
//!     → refresh trigger
//!     → RouteRefresher pulls, recompiles, swaps the table
//! ```
//!
//! # Design Decisions
//! - The main config is read once; routes change through the routes
//!   file, the admin API or the periodic refresh
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, CircuitBreakerSettings, GatewayConfig, ListenerConfig, ObservabilityConfig, RetryConfig,
    RoutingConfig, TimeoutConfig,
};
pub use watcher::RoutesFileWatcher;
