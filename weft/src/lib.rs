//! Coroutine-driven HTTP/1.1, HTTP/2, and WebSocket protocol stack.
//!
//! This crate is the facade that wires the engine crates together into a
//! connection-lifetime task: [`connection::serve_connection`] drives a
//! freshly accepted plaintext transport through HTTP/1.1
//! ([`h1_loop`]), negotiating mid-stream into HTTP/2 ([`h2_bridge`], over
//! `weft-h2`) or WebSocket ([`ws_loop`], over `weft-ws`) as the client
//! requests it; [`tls::serve_tls_connection`] is the TLS/ALPN-driven
//! variant. Everything below `weft-core`, `weft-h1`, `weft-h2`, `weft-ws`,
//! `weft-tls`, and `weft-router` is a standalone library a caller may use
//! directly instead; this crate is the opinionated assembly of them spec §1
//! asks a server embedder to be able to write in a few lines.

pub mod connection;
pub mod h1_loop;
pub mod h2_bridge;
pub mod tls;
pub mod ws_loop;

pub use connection::{run_http2, serve_connection, ProtocolSettings};
pub use tls::serve_tls_connection;
pub use ws_loop::{Message as WsMessage, WsHandler, WsSender, WsSettings};

pub use weft_core::service::{Connection, Route};
pub use weft_core::ConnectionId;
pub use weft_types::{Request, Response, WeftError};
