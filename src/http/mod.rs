//! HTTP boundary: inbound server, outbound client, WebSocket bridge.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, request id, timeout, trace layers)
//!     → GatewayHandler (weights, route lookup, filter chain)
//!     → terminal filter
//!         - client.rs (upstream HTTP via hyper-util)
//!         - websocket.rs (client ⇄ upstream frame pumps)
//!     → response.rs (strip hop-by-hop headers)
//!     → Send to client
//! ```

pub mod client;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use client::{HttpClient, HyperHttpClient};
pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayServer};
