//! Retry, circuit breaker fallback and forward routes end to end.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use api_gateway::route::definition::{PluginDefinition, RouteDefinition};

mod common;

#[tokio::test]
async fn test_retry_on_failure() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let backend = common::start_programmable_backend(move |_| {
        let cc = cc.clone();
        async move {
            let count = cc.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                (503, "Service Unavailable".into())
            } else {
                (200, "Success".into())
            }
        }
    })
    .await;

    let mut config = common::test_config();
    config.routes.push(
        RouteDefinition::new("flaky", format!("http://{}", backend))
            .with_predicate(PluginDefinition::parse("Path=/flaky").unwrap())
            .with_filter(PluginDefinition::parse("Retry=3").unwrap()),
    );
    let gateway = common::start_gateway(config).await;

    let res = common::client()
        .get(gateway.url("/flaky"))
        .send()
        .await
        .expect("Gateway unreachable");

    assert_eq!(res.status(), 200, "Should eventually succeed after retries");
    assert_eq!(res.text().await.unwrap(), "Success");
    assert_eq!(call_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_circuit_breaker_fallback_on_refused_upstream() {
    // Bind then drop to get a port nothing listens on.
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let mut config = common::test_config();
    config.routes.push(
        RouteDefinition::new("orders", format!("http://{}", dead))
            .with_predicate(PluginDefinition::parse("Path=/orders/**").unwrap())
            .with_filter(PluginDefinition::parse("CircuitBreaker=orders, forward:/fallback").unwrap()),
    );
    let gateway = common::start_gateway(config).await;

    let res = common::client().get(gateway.url("/orders/1")).send().await.unwrap();
    assert_eq!(res.status(), 503);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Service unavailable");
}

#[tokio::test]
async fn test_refused_upstream_without_fallback() {
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let mut config = common::test_config();
    config.routes.push(
        RouteDefinition::new("orders", format!("http://{}", dead))
            .with_predicate(PluginDefinition::parse("Path=/orders/**").unwrap()),
    );
    let gateway = common::start_gateway(config).await;

    let res = common::client().get(gateway.url("/orders/1")).send().await.unwrap();
    assert_eq!(res.status(), 503);
}

#[tokio::test]
async fn test_forward_route_reenters_gateway() {
    let backend = common::start_echo_backend().await;
    let mut config = common::test_config();
    config.routes.push(
        RouteDefinition::new("alias", "forward:/v2/status")
            .with_predicate(PluginDefinition::parse("Path=/status").unwrap()),
    );
    config.routes.push(
        RouteDefinition::new("v2", format!("http://{}", backend))
            .with_predicate(PluginDefinition::parse("Path=/v2/**").unwrap()),
    );
    let gateway = common::start_gateway(config).await;

    let res = common::client().get(gateway.url("/status?x=1")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let head = res.text().await.unwrap();
    assert!(head.starts_with("GET /v2/status?x=1 HTTP/1.1"), "{}", head);
}
