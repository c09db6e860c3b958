//! WebSocket bridging through the gateway.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

use api_gateway::route::definition::{PluginDefinition, RouteDefinition};

mod common;

#[tokio::test]
async fn test_websocket_echo_through_gateway() {
    let backend = common::start_websocket_echo_backend().await;

    let mut config = common::test_config();
    config.routes.push(
        RouteDefinition::new("echo", format!("http://{}", backend))
            .with_predicate(PluginDefinition::parse("Path=/ws/**").unwrap()),
    );
    let gateway = common::start_gateway(config).await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/echo", gateway.addr))
        .await
        .expect("WebSocket handshake through gateway failed");

    socket.send(Message::text("hello")).await.unwrap();
    let reply = tokio::time::timeout(std::time::Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reply.into_text().unwrap().as_str(), "hello");

    socket.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    let reply = socket.next().await.unwrap().unwrap();
    assert_eq!(reply.into_data().as_ref(), &[1u8, 2, 3]);

    socket.close(None).await.unwrap();
}

#[tokio::test]
async fn test_websocket_upstream_down_is_503() {
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let mut config = common::test_config();
    config.routes.push(
        RouteDefinition::new("echo", format!("http://{}", dead))
            .with_predicate(PluginDefinition::parse("Path=/ws/**").unwrap()),
    );
    let gateway = common::start_gateway(config).await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws/echo", gateway.addr)).await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => assert_eq!(response.status(), 503),
        other => panic!("expected HTTP error, got {:?}", other.map(|(_, r)| r.status())),
    }
}

#[tokio::test]
async fn test_websocket_subprotocol_chosen_by_upstream() {
    let backend = common::start_websocket_protocol_backend("superchat").await;

    let mut config = common::test_config();
    config.routes.push(
        RouteDefinition::new("chat", format!("http://{}", backend))
            .with_predicate(PluginDefinition::parse("Path=/ws/**").unwrap()),
    );
    let gateway = common::start_gateway(config).await;

    let mut request = format!("ws://{}/ws/chat", gateway.addr).into_client_request().unwrap();
    request
        .headers_mut()
        .insert("sec-websocket-protocol", "chat, superchat".parse().unwrap());
    let (mut socket, response) = tokio_tungstenite::connect_async(request)
        .await
        .expect("WebSocket handshake through gateway failed");

    assert_eq!(response.headers()["sec-websocket-protocol"], "superchat");

    socket.send(Message::text("hi")).await.unwrap();
    let reply = tokio::time::timeout(std::time::Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reply.into_text().unwrap().as_str(), "hi");
    socket.close(None).await.unwrap();
}
