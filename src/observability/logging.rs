//! Structured logging.
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives when neither `RUST_LOG` nor a configured level is set.
pub const DEFAULT_DIRECTIVES: &str = "api_gateway=debug,tower_http=debug";

/// Filter directives for a configured level such as `info`.
pub fn directives(level: Option<&str>) -> String {
    match level.map(str::trim).filter(|l| !l.is_empty()) {
        Some(level) => format!("api_gateway={level},tower_http={level}"),
        None => DEFAULT_DIRECTIVES.to_string(),
    }
}

/// Install the global subscriber. Safe to call once per process.
pub fn init(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| directives(level).into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
