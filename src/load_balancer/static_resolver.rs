//! Resolver over a fixed, configured address list.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::load_balancer::round_robin::RoundRobin;
use crate::load_balancer::{ServiceInstance, ServiceResolver};

#[derive(Debug, Default)]
struct ServiceGroup {
    instances: Vec<ServiceInstance>,
    selector: RoundRobin,
}

/// Round-robins the addresses configured per service id.
#[derive(Debug, Default)]
pub struct StaticServiceResolver {
    services: HashMap<String, ServiceGroup>,
}

impl StaticServiceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `service id → ["host:port" | "https://host:port", ...]`.
    pub fn from_config(services: &BTreeMap<String, Vec<String>>) -> GatewayResult<Self> {
        let mut resolver = Self::new();
        for (service_id, addresses) in services {
            for address in addresses {
                resolver.add_instance(parse_instance(service_id, address)?);
            }
        }
        Ok(resolver)
    }

    pub fn add_instance(&mut self, instance: ServiceInstance) {
        self.services
            .entry(instance.service_id.to_ascii_lowercase())
            .or_default()
            .instances
            .push(instance);
    }

    pub fn service_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.services.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// Parse one configured address of `service_id`.
pub fn parse_instance(service_id: &str, address: &str) -> GatewayResult<ServiceInstance> {
    let invalid = |reason: &str| {
        GatewayError::InvalidArgument(format!("service '{}' address '{}': {}", service_id, address, reason))
    };
    let text = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };
    let url = Url::parse(&text).map_err(|e| invalid(&e.to_string()))?;
    let secure = match url.scheme() {
        "http" => false,
        "https" => true,
        _ => return Err(invalid("scheme must be http or https")),
    };
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("missing host"))?;
    let port = url.port_or_known_default().ok_or_else(|| invalid("missing port"))?;

    Ok(ServiceInstance {
        service_id: service_id.to_string(),
        host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
        port,
        secure,
    })
}

#[async_trait]
impl ServiceResolver for StaticServiceResolver {
    async fn choose(&self, service_id: &str) -> Option<ServiceInstance> {
        let group = self.services.get(&service_id.to_ascii_lowercase())?;
        group.selector.next_instance(&group.instances).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_robins_configured_addresses() {
        let mut services = BTreeMap::new();
        services.insert(
            "users".to_string(),
            vec!["127.0.0.1:9001".to_string(), "https://users.internal".to_string()],
        );
        let resolver = StaticServiceResolver::from_config(&services).unwrap();

        let first = resolver.choose("USERS").await.unwrap();
        assert_eq!(first.authority(), "127.0.0.1:9001");
        assert!(!first.secure);

        let second = resolver.choose("users").await.unwrap();
        assert_eq!(second.authority(), "users.internal:443");
        assert_eq!(second.scheme(), "https");

        assert!(resolver.choose("orders").await.is_none());
    }

    #[test]
    fn test_parse_instance() {
        let v6 = parse_instance("svc", "[::1]:8080").unwrap();
        assert_eq!(v6.host, "::1");
        assert_eq!(v6.authority(), "[::1]:8080");

        assert!(parse_instance("svc", "ftp://host:21").is_err());
        assert!(parse_instance("svc", "http://").is_err());
    }
}
