//! The HTTP/1.1 keep-alive connection driver: read one request, dispatch
//! it through [`Route`], write the response, and repeat until the peer
//! closes the connection or either side asks for `Connection: close` —
//! grounded in `galay-http/server/HttpServer.cc`'s per-connection request
//! loop, with its direct-dispatch callback replaced by `weft_core::Route`
//! and its upgrade branches wired to `weft-h2`/`weft-ws`.

use std::sync::Arc;

use weft_core::io::{AsyncIo, PrefixedIo, SharedIo};
use weft_core::service::{Connection, Route};
use weft_h1::{ChunkedDecoder, Http1Settings, Reader, Writer};
use weft_types::{Method, Request, Response, ResponseHeader, StatusCode, Version, WeftError};

/// Where the connection goes after [`serve_http1`] returns.
pub enum Next<S> {
    /// The peer closed, or the loop ended on an unrecoverable error.
    Done,
    /// The client spoke the `PRI * HTTP/2.0` preface or completed an
    /// `h2c` upgrade; `io` replays any bytes already read off the wire
    /// that the HTTP/2 connection loop must see again (spec §4.1 step 3,
    /// §4.8's h2c handoff).
    Http2(PrefixedIo<S>),
    /// A `Upgrade: websocket` handshake completed; `io` is positioned
    /// right after the 101 response, ready for the WebSocket frame loop.
    WebSocket(S),
}

/// Drives one accepted connection's HTTP/1.1 traffic.
///
/// `Reader` and `Writer` each take their transport by value, with no
/// existing precedent in this workspace for sharing one socket between
/// them — a keep-alive loop needs both at once on the *same* socket, so
/// `io` is wrapped in [`SharedIo`] and each engine gets a cheap clone; the
/// two clones are never actually contended, since one connection's reads
/// and writes are strictly sequential (spec §5).
pub async fn serve_http1<IO, R>(
    io: IO,
    settings: Http1Settings,
    route: Arc<R>,
    conn: &Connection,
) -> Result<Next<SharedIo<IO>>, WeftError>
where
    IO: AsyncIo,
    R: Route + ?Sized,
{
    let shared = SharedIo::new(io);
    let mut reader = Reader::new(shared.clone(), settings);
    let mut writer = Writer::new(shared.clone(), settings);

    loop {
        let mut request = match reader.get_request().await {
            Ok(request) => request,
            Err(WeftError::ConnectionClose) => return Ok(Next::Done),
            Err(e) => {
                let _ = writer.reply(&error_response(&e)).await;
                return Ok(Next::Done);
            }
        };

        if request.header.method == Method::Pri {
            let prefix = reader.take_buffered();
            return Ok(Next::Http2(PrefixedIo::new(prefix, shared)));
        }

        if let Err(e) = drain_chunked_body(&mut reader, &mut request).await {
            let _ = writer.reply(&error_response(&e)).await;
            return Ok(Next::Done);
        }

        if let Some(upgrade) = request.header.fields.get("upgrade").map(str::to_ascii_lowercase) {
            if upgrade == "websocket" {
                return match writer.upgrade_to_websocket(&request).await {
                    Ok(()) => Ok(Next::WebSocket(shared)),
                    Err(e) => {
                        let _ = writer.reply(&error_response(&e)).await;
                        Ok(Next::Done)
                    }
                };
            } else if upgrade == "h2c" {
                return match writer.upgrade_to_http2(&request).await {
                    Ok(()) => {
                        let prefix = reader.take_buffered();
                        Ok(Next::Http2(PrefixedIo::new(prefix, shared)))
                    }
                    Err(e) => {
                        let _ = writer.reply(&error_response(&e)).await;
                        Ok(Next::Done)
                    }
                };
            }
        }

        let keep_alive = should_keep_alive(&request);
        let mut response = match route.route(request, conn).await {
            Ok(response) => response,
            Err(e) => error_response(&e),
        };
        finalize_response(&mut response, keep_alive);

        if writer.reply(&response).await.is_err() || !keep_alive {
            return Ok(Next::Done);
        }
    }
}

/// For a `Transfer-Encoding: chunked` request, drains every chunk via
/// [`Reader::get_chunk_data`] and folds the trailer section into
/// `request.header.fields` (spec §4.1a), leaving `request.body` fully
/// populated the same as the Content-Length case before `route` runs.
async fn drain_chunked_body<IO: AsyncIo>(
    reader: &mut Reader<IO>,
    request: &mut Request,
) -> Result<(), WeftError> {
    let is_chunked = request
        .header
        .fields
        .get("transfer-encoding")
        .is_some_and(|te| te.eq_ignore_ascii_case("chunked"));
    if !is_chunked {
        return Ok(());
    }

    let mut decoder = ChunkedDecoder::new();
    let mut body = Vec::new();
    loop {
        match reader.get_chunk_data(&mut decoder).await? {
            Some(chunk) => body.extend_from_slice(&chunk),
            None => break,
        }
    }
    request.body = body;
    for (name, value) in decoder.trailers.iter() {
        request.header.fields.add(name, value);
    }
    Ok(())
}

/// RFC 7230 §6.3 keep-alive default: HTTP/1.1 stays open unless
/// `Connection: close` is present; HTTP/1.0 closes unless the client
/// opts in with `Connection: keep-alive`.
fn should_keep_alive(request: &Request) -> bool {
    let connection = request.header.fields.get("connection").map(str::to_ascii_lowercase);
    match request.header.version {
        Version::Http11 => connection.as_deref() != Some("close"),
        _ => connection.as_deref() == Some("keep-alive"),
    }
}

/// Adds a `Content-Length` when the handler left the framing unspecified,
/// and forces `Connection: close` once the loop has decided not to
/// continue — a handler should never need to know about connection
/// lifecycle itself.
fn finalize_response(response: &mut Response, keep_alive: bool) {
    if !response.header.fields.has_key("content-length") && !response.header.fields.has_key("transfer-encoding") {
        response.header.fields.add("Content-Length", response.body.len().to_string());
    }
    if !keep_alive {
        response.header.fields.set("Connection", "close");
    }
}

/// Maps a dispatch-time [`WeftError`] to the status-coded response spec §7
/// assigns it; errors with no HTTP/1.1 mapping (transport/H2/WS-only
/// variants) fall back to 500.
fn error_response(err: &WeftError) -> Response {
    let status = err.status_code().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut header = ResponseHeader::new(Version::Http11, status);
    header.fields.add("Content-Length", "0");
    Response::new(header, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use weft_core::service::Connection;
    use weft_types::Message;

    struct ScriptedIo {
        chunks: VecDeque<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl ScriptedIo {
        fn new(chunks: Vec<&[u8]>) -> Self {
            Self {
                chunks: chunks.into_iter().map(|c| c.to_vec()).collect(),
                sent: Vec::new(),
            }
        }
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

    fn conn() -> Connection {
        Connection::new(weft_core::ConnectionId(1), None)
    }

    #[tokio::test]
    async fn single_request_then_connection_close_ends_loop() {
        let io = ScriptedIo::new(vec![
            b"GET / HTTP/1.1\r\nHost: t\r\nConnection: close\r\n\r\n",
        ]);
        let route = Arc::new(Echo);
        let next = serve_http1(io, Http1Settings::default(), route, &conn())
            .await
            .unwrap();
        assert!(matches!(next, Next::Done));
    }

    #[tokio::test]
    async fn pri_preface_hands_off_to_http2() {
        let io = ScriptedIo::new(vec![b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n"]);
        let route = Arc::new(Echo);
        let next = serve_http1(io, Http1Settings::default(), route, &conn())
            .await
            .unwrap();
        assert!(matches!(next, Next::Http2(_)));
    }

    #[tokio::test]
    async fn chunked_body_is_drained_before_routing() {
        let io = ScriptedIo::new(vec![
            b"POST /a HTTP/1.1\r\nHost: t\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n2\r\nHi\r\n0\r\n\r\n",
        ]);
        let route = Arc::new(Echo);
        let next = serve_http1(io, Http1Settings::default(), route, &conn())
            .await
            .unwrap();
        assert!(matches!(next, Next::Done));
    }

    #[tokio::test]
    async fn websocket_upgrade_request_hands_off_to_ws_loop() {
        let io = ScriptedIo::new(vec![
            b"GET /chat HTTP/1.1\r\nHost: t\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n",
        ]);
        let route = Arc::new(Echo);
        let next = serve_http1(io, Http1Settings::default(), route, &conn())
            .await
            .unwrap();
        assert!(matches!(next, Next::WebSocket(_)));
    }
}
