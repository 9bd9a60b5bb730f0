//! The HTTP/1.1 response writer (spec §4.2), grounded in
//! `galay-http/kernel/HttpWriter.cc`'s `sendData`/`sendChunkData`
//! coroutines: serialize once, then loop `send` until the buffer drains —
//! satisfied here by delegating to [`weft_core::io::AsyncIo::send`], whose
//! contract already loops internally (spec §4.2's "Send loop contract").

use crate::settings::Http1Settings;
use weft_core::io::AsyncIo;
use weft_types::{HeaderMap, Request, Response, ResponseHeader, StatusCode, Version, WeftError};

const WEBSOCKET_VERSION: &str = "13";

pub struct Writer<IO> {
    io: IO,
    settings: Http1Settings,
}

impl<IO: AsyncIo> Writer<IO> {
    pub fn new(io: IO, settings: Http1Settings) -> Self {
        Self { io, settings }
    }

    pub fn into_inner(self) -> IO {
        self.io
    }

    pub fn get_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), WeftError> {
        weft_core::io::timeout(self.settings.send_timeout, self.io.send(bytes), || {
            WeftError::SendTimeout
        })
        .await?
    }

    /// `reply(response, timeout)`: serializes the status line, headers, and
    /// body in one write.
    pub async fn reply(&mut self, response: &Response) -> Result<(), WeftError> {
        let mut out = serialize_header(&response.header);
        out.extend_from_slice(&response.body);
        self.send(&out).await
    }

    /// Serializes and sends a response's status line and headers with no
    /// body and no implied transfer-encoding — the primitive `reply` and
    /// `reply_chunk_header` both build on, also used directly by
    /// static-file serving ahead of a `sendfile` transfer, where the
    /// framing is an explicit `Content-Length` rather than chunked.
    pub async fn reply_header(&mut self, header: &ResponseHeader) -> Result<(), WeftError> {
        self.send(&serialize_header(header)).await
    }

    /// A 1xx informational response that doesn't end the transaction —
    /// used internally by the upgrade handshakes, and available directly
    /// for `Expect: 100-continue` handling (spec §4.2a).
    pub async fn reply_informational(
        &mut self,
        status: StatusCode,
        fields: &HeaderMap,
    ) -> Result<(), WeftError> {
        let mut header = ResponseHeader::new(Version::Http11, status);
        header.fields = fields.clone();
        self.send(&serialize_header(&header)).await
    }

    /// `reply_chunk_header`: adds `Transfer-Encoding: chunked` if the
    /// caller hasn't already, then emits the status line and headers with
    /// no body.
    pub async fn reply_chunk_header(&mut self, header: &mut ResponseHeader) -> Result<(), WeftError> {
        if !header.fields.has_key("transfer-encoding") {
            header.fields.add("Transfer-Encoding", "chunked");
        }
        self.send(&serialize_header(header)).await
    }

    /// `reply_chunk_data`: one `hex(len) CRLF bytes CRLF` frame, with the
    /// terminating `"0\r\n\r\n"` appended when `is_last`.
    pub async fn reply_chunk_data(&mut self, data: &[u8], is_last: bool) -> Result<(), WeftError> {
        let mut out = Vec::with_capacity(data.len() + 16);
        out.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
        out.extend_from_slice(data);
        out.extend_from_slice(b"\r\n");
        if is_last {
            out.extend_from_slice(b"0\r\n\r\n");
        }
        self.send(&out).await
    }

    /// Validates the WebSocket upgrade preconditions (spec §4.2) and
    /// replies 101 with the computed `Sec-WebSocket-Accept`.
    pub async fn upgrade_to_websocket(&mut self, request: &Request) -> Result<(), WeftError> {
        let fields = &request.header.fields;
        let upgrade_ok = fields
            .get("upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
        let connection_present = fields.has_key("connection");
        let key = fields.get("sec-websocket-key").ok_or(WeftError::BadRequest)?;
        let version_ok = fields
            .get("sec-websocket-version")
            .is_some_and(|v| v == WEBSOCKET_VERSION);
        if !upgrade_ok || !connection_present || !version_ok {
            return Err(WeftError::BadRequest);
        }

        let accept = weft_ws::accept_key(key);
        let mut header = ResponseHeader::new(Version::Http11, StatusCode::SWITCHING_PROTOCOLS);
        header.fields.add("Upgrade", "websocket");
        header.fields.add("Connection", "Upgrade");
        header.fields.add("Sec-WebSocket-Accept", accept);
        self.send(&serialize_header(&header)).await
    }

    /// Validates the cleartext `h2c` upgrade preconditions (spec §4.2) and
    /// replies 101. The caller then transitions into the HTTP/2 connection
    /// loop with the next inbound byte being the connection preface.
    pub async fn upgrade_to_http2(&mut self, request: &Request) -> Result<(), WeftError> {
        let fields = &request.header.fields;
        let upgrade_ok = fields
            .get("upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("h2c"));
        let settings_present = fields.has_key("http2-settings");
        if !upgrade_ok || !settings_present {
            return Err(WeftError::BadRequest);
        }

        let mut header = ResponseHeader::new(Version::Http11, StatusCode::SWITCHING_PROTOCOLS);
        header.fields.add("Connection", "Upgrade");
        header.fields.add("Upgrade", "h2c");
        self.send(&serialize_header(&header)).await
    }

    /// Kernel-assisted transfer for static-file responses (spec §4.2's
    /// `sendfile`); short returns are retried internally until `len` bytes
    /// have been transmitted, matching `AsyncIo::sendfile`'s contract.
    pub async fn sendfile(&mut self, file: &mut tokio::fs::File, len: u64) -> Result<u64, WeftError> {
        let chunk_size = self.settings.sendfile_chunk_size;
        weft_core::io::timeout(
            self.settings.send_timeout,
            self.io.sendfile(file, len, chunk_size),
            || WeftError::SendTimeout,
        )
        .await?
    }
}

fn serialize_header(header: &ResponseHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    out.extend_from_slice(
        format!(
            "{} {} {}\r\n",
            header.version.as_str(),
            header.status.as_u16(),
            header.status.reason_phrase()
        )
        .as_bytes(),
    );
    for (name, value) in header.fields.iter() {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out
}
