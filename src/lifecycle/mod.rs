//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → registries → compiler → initial refresh
//!     → handler → background tasks → listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → server drains, refresher and
//!     admin API exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Trigger route refresh
//! ```
//!
//! # Design Decisions
//! - Ordered startup: routes are compiled before the listener serves
//! - Fail fast: a startup error is fatal

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Gateway, StartupError};
