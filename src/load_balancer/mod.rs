//! Service resolution for `lb://` routes.
//!
//! # Data Flow
//! ```text
//! lb://user-service/path
//!     → LoadBalancerClientFilter (filter/global/load_balancer.rs)
//!     → ServiceResolver::choose("user-service")
//!         - static_resolver.rs (configured addresses)
//!         - round_robin.rs (rotate through instances)
//!     → http://10.0.0.7:8080/path
//! ```
//!
//! # Design Decisions
//! - Resolution is a trait so discovery-backed resolvers can be plugged in
//! - Instance lists are fixed at construction; the counter is the only
//!   mutable state

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

pub mod round_robin;
pub mod static_resolver;

pub use static_resolver::StaticServiceResolver;

/// One physical instance of a logical service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInstance {
    pub service_id: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl ServiceInstance {
    /// `http` or `https`.
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Resolves a logical service id to a concrete instance.
#[async_trait]
pub trait ServiceResolver: Send + Sync + fmt::Debug {
    /// Pick an instance for `service_id`, or `None` if there is none.
    async fn choose(&self, service_id: &str) -> Option<ServiceInstance>;
}
