//! The TLS/ALPN variant of the protocol negotiator: complete the TLS
//! handshake, then read back the protocol ALPN settled on rather than
//! sniffing the plaintext preface, per `weft_tls::get_alpn`'s contract —
//! when the client didn't offer ALPN at all this falls back to the same
//! preface-sniffing `h1_loop`/`connection::serve_connection` already does
//! for plaintext connections.
//!
//! Grounded in `armature-core/src/tls.rs`'s accept-then-branch-on-ALPN
//! shape, joined with this workspace's own `connection.rs` negotiator.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use weft_core::io::{AsyncIo, SharedIo, Transport};
use weft_core::service::{Connection, Route};
use weft_tls::{get_alpn, AlpnProtocol, TlsConfig};
use weft_types::WeftError;

use crate::connection::{self, ProtocolSettings};
use crate::ws_loop::WsHandler;

/// Completes the TLS handshake on `io`, then drives the resulting stream
/// through HTTP/2 directly if ALPN settled on it, or through the ordinary
/// HTTP/1.1 negotiator (which itself may upgrade to HTTP/2 or WebSocket)
/// otherwise.
pub async fn serve_tls_connection<IO, R, W>(
    io: IO,
    tls_config: &TlsConfig,
    conn: Connection,
    settings: ProtocolSettings,
    route: Arc<R>,
    ws_handler: Arc<W>,
) -> Result<(), WeftError>
where
    IO: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static,
    R: Route + 'static,
    W: WsHandler<SharedIo<Transport<tokio_rustls::server::TlsStream<IO>>>>,
{
    let stream = tls_config
        .acceptor()
        .accept(io)
        .await
        .map_err(WeftError::RecvError)?;
    let alpn = get_alpn(&stream);
    let transport = Transport::new(stream);

    match alpn {
        Some(AlpnProtocol::Http2) => connection::run_http2(transport, settings.h2, route, conn).await,
        Some(AlpnProtocol::Http11) | Some(AlpnProtocol::Http10) | None => {
            connection::serve_connection(transport, conn, settings, route, ws_handler).await
        }
    }
}
