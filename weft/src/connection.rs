//! Ties `h1_loop`, `h2_bridge`, and `ws_loop` into one connection-lifetime
//! task: drive a freshly accepted plaintext transport through HTTP/1.1,
//! negotiating into HTTP/2 (`PRI *` preface or `h2c` Upgrade) or WebSocket
//! as the client requests, until the connection ends.
//!
//! Grounded in `galay-http/server/HttpServer.cc`'s `onConnection` handler,
//! which performs the same preface sniff before control reaches a
//! request/message callback; `tls.rs` covers the TLS/ALPN variant of this
//! same negotiation.

use std::sync::Arc;

use weft_core::io::{AsyncIo, SharedIo};
use weft_core::service::{Connection, Route};
use weft_h1::Http1Settings;
use weft_h2::ConnectionConfig;
use weft_types::WeftError;

use crate::h1_loop::{self, Next};
use crate::h2_bridge::RouteCallbacks;
use crate::ws_loop::{self, WsHandler, WsSettings};

/// Tuning knobs for every engine a connection might end up speaking,
/// gathered behind one type for callers that just want sensible defaults.
#[derive(Clone, Default)]
pub struct ProtocolSettings {
    pub h1: Http1Settings,
    pub h2: ConnectionConfig,
    pub ws: WsSettings,
}

/// Drives one accepted connection to completion, picking HTTP/2 or
/// WebSocket mid-stream if the client asks for it.
pub async fn serve_connection<IO, R, W>(
    io: IO,
    conn: Connection,
    settings: ProtocolSettings,
    route: Arc<R>,
    ws_handler: Arc<W>,
) -> Result<(), WeftError>
where
    IO: AsyncIo,
    R: Route + 'static,
    W: WsHandler<SharedIo<IO>>,
{
    match h1_loop::serve_http1(io, settings.h1, route.clone(), &conn).await? {
        Next::Done => Ok(()),
        Next::Http2(prefixed) => run_http2(prefixed, settings.h2, route, conn).await,
        Next::WebSocket(io) => ws_loop::serve_websocket(io, ws_handler, settings.ws).await,
    }
}

/// Runs the HTTP/2 connection loop over `io`, bridging [`weft_h2::Callbacks`]
/// to `route` via [`RouteCallbacks`]. Exposed separately from
/// [`serve_connection`] so `tls.rs` can jump straight here when ALPN
/// already settled on h2, skipping the HTTP/1.1 preface sniff entirely.
pub async fn run_http2<IO, R>(io: IO, config: ConnectionConfig, route: Arc<R>, conn: Connection) -> Result<(), WeftError>
where
    IO: AsyncIo,
    R: Route + 'static,
{
    let callbacks = RouteCallbacks::new(route, conn);
    let mut connection = weft_h2::Connection::new(io, config);
    connection
        .run(&callbacks)
        .await
        .map_err(|e| WeftError::ConnectionError { reason: e.reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use weft_core::ConnectionId;
    use weft_types::{Message, Request, Response, ResponseHeader, StatusCode, Version};
    use weft_ws::Opcode;

    struct ScriptedIo {
        chunks: VecDeque<Vec<u8>>,
        sent: Vec<u8>,
    }

    #[async_trait]
    impl AsyncIo for ScriptedIo {
        async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, WeftError> {
            match self.chunks.pop_front() {
                Some(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                None => Ok(0),
            }
        }

        async fn send(&mut self, bytes: &[u8]) -> Result<(), WeftError> {
            self.sent.extend_from_slice(bytes);
            Ok(())
        }
    }

    struct Echo;

    #[async_trait]
    impl Route for Echo {
        async fn route(&self, request: Request, _conn: &Connection) -> Result<Response, WeftError> {
            let header = ResponseHeader::new(Version::Http11, StatusCode::OK);
            Ok(Message::new(header, request.body))
        }
    }

    struct NoOpWsHandler;

    #[async_trait]
    impl<IO: AsyncIo> WsHandler<IO> for NoOpWsHandler {
        async fn on_message(&self, _message: ws_loop::Message, _sender: &ws_loop::WsSender<IO>) -> Result<(), WeftError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn plain_http1_request_never_touches_the_ws_handler() {
        let io = ScriptedIo {
            chunks: VecDeque::from([b"GET / HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n".to_vec()]),
            sent: Vec::new(),
        };
        let conn = Connection::new(ConnectionId(1), None);
        let result = serve_connection(
            io,
            conn,
            ProtocolSettings::default(),
            Arc::new(Echo),
            Arc::new(NoOpWsHandler),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn websocket_upgrade_is_driven_to_a_clean_close() {
        let close_frame = weft_ws::to_bytes(&weft_ws::Frame::new(Opcode::Close, Vec::new(), true), true);
        let io = ScriptedIo {
            chunks: VecDeque::from([
                b"GET /chat HTTP/1.1\r\nHost: t\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n".to_vec(),
                close_frame,
            ]),
            sent: Vec::new(),
        };
        let conn = Connection::new(ConnectionId(2), None);
        let result = serve_connection(
            io,
            conn,
            ProtocolSettings::default(),
            Arc::new(Echo),
            Arc::new(NoOpWsHandler),
        )
        .await;
        assert!(result.is_ok());
    }
}
