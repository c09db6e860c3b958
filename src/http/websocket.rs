//! WebSocket proxy bridge.
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Gateway ←──── WebSocket frames ────→ Upstream
//!         client→upstream pump ─────────────────────→
//!         ←───────────────────── upstream→client pump
//! ```
//!
//! # Design Decisions
//! - Frame-level forwarding (no message buffering)
//! - Close frames propagated in both directions
//! - The bridge ends when both pumps end, not when the first one does

use std::fmt;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{pin_mut, Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame as UpstreamCloseFrame, Message as UpstreamMessage};
use tokio_tungstenite::WebSocketStream;

/// Client frame as sent to the upstream.
pub fn to_upstream(message: Message) -> Option<UpstreamMessage> {
    Some(match message {
        Message::Text(text) => UpstreamMessage::Text(text.as_str().to_string().into()),
        Message::Binary(data) => UpstreamMessage::Binary(data),
        Message::Ping(data) => UpstreamMessage::Ping(data),
        Message::Pong(data) => UpstreamMessage::Pong(data),
        Message::Close(frame) => UpstreamMessage::Close(frame.map(|f| UpstreamCloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().to_string().into(),
        })),
    })
}

/// Upstream frame as sent to the client; raw frames are dropped.
pub fn to_client(message: UpstreamMessage) -> Option<Message> {
    match message {
        UpstreamMessage::Text(text) => Some(Message::Text(text.as_str().to_string().into())),
        UpstreamMessage::Binary(data) => Some(Message::Binary(data)),
        UpstreamMessage::Ping(data) => Some(Message::Ping(data)),
        UpstreamMessage::Pong(data) => Some(Message::Pong(data)),
        UpstreamMessage::Close(frame) => Some(Message::Close(frame.map(|f| CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_string().into(),
        }))),
        UpstreamMessage::Frame(_) => None,
    }
}

/// Forward every message from `source` to `sink` until `source` ends or a
/// write fails, then close `sink`. Returns the number of forwarded messages.
async fn pump<S, K, T, U, E>(direction: &'static str, source: S, sink: K, convert: fn(T) -> Option<U>) -> usize
where
    S: Stream<Item = Result<T, E>>,
    E: fmt::Display,
    K: Sink<U>,
    K::Error: fmt::Display,
{
    pin_mut!(source);
    pin_mut!(sink);
    let mut forwarded = 0;

    while let Some(item) = source.next().await {
        let message = match item {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(direction, error = %e, "WebSocket read ended");
                break;
            }
        };
        let Some(message) = convert(message) else {
            continue;
        };
        if let Err(e) = sink.send(message).await {
            tracing::debug!(direction, error = %e, "WebSocket write failed");
            break;
        }
        forwarded += 1;
    }

    if let Err(e) = sink.close().await {
        tracing::trace!(direction, error = %e, "WebSocket close failed");
    }
    forwarded
}

/// Run both pumps to completion.
pub async fn bridge_streams<CR, CT, UR, UT, CE, UE>(
    client_rx: CR,
    client_tx: CT,
    upstream_rx: UR,
    upstream_tx: UT,
) -> (usize, usize)
where
    CR: Stream<Item = Result<Message, CE>>,
    CE: fmt::Display,
    CT: Sink<Message>,
    CT::Error: fmt::Display,
    UR: Stream<Item = Result<UpstreamMessage, UE>>,
    UE: fmt::Display,
    UT: Sink<UpstreamMessage>,
    UT::Error: fmt::Display,
{
    tokio::join!(
        pump("client→upstream", client_rx, upstream_tx, to_upstream),
        pump("upstream→client", upstream_rx, client_tx, to_client),
    )
}

/// Bridge an upgraded client socket with an upstream connection.
pub async fn bridge<S>(client: WebSocket, upstream: WebSocketStream<S>, request_id: String)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (client_tx, client_rx) = client.split();
    let (upstream_tx, upstream_rx) = upstream.split();
    let (sent, received) = bridge_streams(client_rx, client_tx, upstream_rx, upstream_tx).await;
    tracing::debug!(request_id = %request_id, sent, received, "WebSocket bridge closed");
}
