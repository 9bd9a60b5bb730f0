//! The HTTP/1.1 message reader (spec §4.1), grounded in
//! `galay-http/HttpReader.cc`'s `readRequest` coroutine: grow a buffer in
//! `recv_incr_length` increments until the header terminator is found,
//! parse the header, then read the body according to
//! Content-Length/chunked/method rules.
//!
//! Unlike the original (which re-scans the whole socket buffer through a
//! bespoke `checkAndGetHeaderString`), header-end detection here uses
//! `memchr::memmem`, and field parsing is handed to `httparse` the way
//! `rama-http-core/src/proto/h1/role.rs` does — the grammar and error
//! taxonomy are kept, only the scanning primitive is upgraded.

use crate::chunked::ChunkedDecoder;
use crate::settings::Http1Settings;
use bytes::{Buf, BytesMut};
use weft_core::io::AsyncIo;
use weft_types::{HeaderMap, Method, Request, RequestHeader, Version, WeftError};

const MAX_HEADERS: usize = 64;

/// Reads successive HTTP/1.1 requests off one connection, carrying
/// leftover bytes (pipelined requests, or body bytes read ahead of the
/// header scan) between calls.
pub struct Reader<IO> {
    io: IO,
    settings: Http1Settings,
    buf: BytesMut,
}

impl<IO: AsyncIo> Reader<IO> {
    pub fn new(io: IO, settings: Http1Settings) -> Self {
        Self {
            io,
            settings,
            buf: BytesMut::new(),
        }
    }

    pub fn into_inner(self) -> IO {
        self.io
    }

    pub fn get_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    /// Drains and returns every byte buffered but not yet consumed by a
    /// completed request — used when the first four bytes spell `"PRI "`
    /// (spec §4.1 step 3): the caller transitions into the HTTP/2 preface
    /// reader and must see these bytes again, unconsumed.
    pub fn take_buffered(&mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }

    async fn fill_more(&mut self) -> Result<usize, WeftError> {
        let mut chunk = vec![0u8; self.settings.recv_incr_length];
        let n = weft_core::io::timeout(self.settings.recv_timeout, self.io.recv(&mut chunk), || {
            WeftError::RecvTimeout
        })
        .await??;
        if n > 0 {
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(n)
    }

    /// Produces one fully-formed request, or a streaming sentinel for
    /// chunked bodies (spec §4.1's contract table).
    pub async fn get_request(&mut self) -> Result<Request, WeftError> {
        loop {
            if self.buf.len() >= 4 && &self.buf[..4] == b"PRI " {
                let header = RequestHeader::new(Method::Pri, "*", Version::Http2);
                return Ok(Request::new(header, Vec::new()));
            }
            if let Some(end) = memchr::memmem::find(&self.buf, b"\r\n\r\n") {
                return self.finish_request(end + 4).await;
            }
            if self.buf.len() > self.settings.max_header_size {
                return Err(WeftError::HeaderTooLong);
            }
            let was_empty = self.buf.is_empty();
            let n = self.fill_more().await?;
            if n == 0 {
                return Err(if was_empty {
                    WeftError::ConnectionClose
                } else {
                    WeftError::BadRequest
                });
            }
        }
    }

    async fn finish_request(&mut self, header_len: usize) -> Result<Request, WeftError> {
        if header_len > self.settings.max_header_size {
            return Err(WeftError::HeaderTooLong);
        }

        let header_bytes = self.buf.split_to(header_len);
        let mut httparse_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut httparse_headers);
        let status = parsed
            .parse(&header_bytes)
            .map_err(|_| WeftError::BadRequest)?;
        if status.is_partial() {
            return Err(WeftError::BadRequest);
        }

        let method = Method::parse(parsed.method.ok_or(WeftError::BadRequest)?);
        let target = parsed.path.ok_or(WeftError::BadRequest)?.to_owned();
        let version = match parsed.version.ok_or(WeftError::BadRequest)? {
            0 => Version::Http10,
            1 => Version::Http11,
            _ => return Err(WeftError::VersionNotSupport),
        };

        let mut fields = HeaderMap::new();
        for h in parsed.headers.iter() {
            let value = std::str::from_utf8(h.value).map_err(|_| WeftError::BadRequest)?;
            fields.add_parsed(h.name, value);
        }

        let mut header = RequestHeader::new(method, target, version);
        header.fields = fields;

        let body = self.read_body(&header).await?;
        Ok(Request::new(header, body))
    }

    async fn read_body(&mut self, header: &RequestHeader) -> Result<Vec<u8>, WeftError> {
        if let Some(te) = header.fields.get("transfer-encoding") {
            if te.eq_ignore_ascii_case("chunked") {
                // Streamed by `get_chunk_data`; the caller reads chunks
                // separately (spec §4.1 contract).
                return Ok(Vec::new());
            }
        }

        match header.fields.get("content-length") {
            Some(raw) => {
                let len: usize = raw.trim().parse().map_err(|_| WeftError::ContentLengthConvertError)?;
                if len == 0 {
                    return Ok(Vec::new());
                }
                self.recv_exact(len).await
            }
            None if header.method.allows_absent_body_length() => Ok(Vec::new()),
            None => Err(WeftError::ContentLengthNotContained),
        }
    }

    async fn recv_exact(&mut self, len: usize) -> Result<Vec<u8>, WeftError> {
        while self.buf.len() < len {
            let n = self.fill_more().await?;
            if n == 0 {
                return Err(WeftError::ConnectionClose);
            }
        }
        Ok(self.buf.split_to(len).to_vec())
    }

    /// Pulls the next chunk of a `Transfer-Encoding: chunked` body, per
    /// spec §4.1's chunked reader state machine. Returns `Ok(None)` once
    /// the terminating zero-length chunk and trailer section have been
    /// consumed; `trailers` are then available via `decoder.trailers`.
    pub async fn get_chunk_data(
        &mut self,
        decoder: &mut ChunkedDecoder,
    ) -> Result<Option<Vec<u8>>, WeftError> {
        let mut out = Vec::new();
        loop {
            if !self.buf.is_empty() {
                let input = self.buf.clone();
                let consumed = decoder.feed(&input, |bytes| out.extend_from_slice(bytes))?;
                self.buf.advance(consumed);
            }
            if decoder.is_done() {
                return Ok(if out.is_empty() { None } else { Some(out) });
            }
            if !out.is_empty() {
                return Ok(Some(out));
            }
            let mut chunk = vec![0u8; self.settings.chunk_buffer_size];
            let n = weft_core::io::timeout(self.settings.recv_timeout, self.io.recv(&mut chunk), || {
                WeftError::RecvTimeout
            })
            .await??;
            if n == 0 {
                return Err(WeftError::ConnectionClose);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// A fake transport that replays pre-scripted `recv` payloads, letting
    /// tests drive the reader across arbitrary socket-boundary splits.
    struct ScriptedIo {
        chunks: VecDeque<Vec<u8>>,
    }

    #[async_trait::async_trait]
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

        async fn send(&mut self, _bytes: &[u8]) -> Result<(), WeftError> {
            Ok(())
        }
    }

    fn scripted(chunks: Vec<&[u8]>) -> ScriptedIo {
        ScriptedIo {
            chunks: chunks.into_iter().map(|c| c.to_vec()).collect(),
        }
    }

    #[tokio::test]
    async fn parses_get_with_query_args() {
        let io = scripted(vec![b"GET /a?x=1 HTTP/1.1\r\nHost: t\r\n\r\n"]);
        let mut reader = Reader::new(io, Http1Settings::default());
        let req = reader.get_request().await.unwrap();
        assert_eq!(req.header.method, Method::Get);
        assert_eq!(req.header.target, "/a?x=1");
        assert_eq!(req.header.args.get("x").map(String::as_str), Some("1"));
        assert_eq!(req.header.fields.get("Host"), Some("t"));
        assert!(req.body.is_empty());
    }

    #[tokio::test]
    async fn reads_content_length_body() {
        let io = scripted(vec![b"POST /a HTTP/1.1\r\nHost: t\r\nContent-Length: 5\r\n\r\nhello"]);
        let mut reader = Reader::new(io, Http1Settings::default());
        let req = reader.get_request().await.unwrap();
        assert_eq!(req.body, b"hello");
    }

    #[tokio::test]
    async fn header_split_across_multiple_recvs() {
        let io = scripted(vec![
            b"GET / HTTP/1.1\r\nHo",
            b"st: t\r\n\r\n",
        ]);
        let mut reader = Reader::new(io, Http1Settings::default());
        let req = reader.get_request().await.unwrap();
        assert_eq!(req.header.fields.get("Host"), Some("t"));
    }

    #[tokio::test]
    async fn missing_content_length_on_post_is_an_error() {
        let io = scripted(vec![b"POST /a HTTP/1.1\r\nHost: t\r\n\r\n"]);
        let mut reader = Reader::new(io, Http1Settings::default());
        assert!(matches!(
            reader.get_request().await.unwrap_err(),
            WeftError::ContentLengthNotContained
        ));
    }

    #[tokio::test]
    async fn header_too_long_is_rejected() {
        let mut settings = Http1Settings::default();
        settings.max_header_size = 16;
        let io = scripted(vec![b"GET /aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa HTTP/1.1\r\n\r\n"]);
        let mut reader = Reader::new(io, settings);
        assert!(matches!(
            reader.get_request().await.unwrap_err(),
            WeftError::HeaderTooLong
        ));
    }

    #[tokio::test]
    async fn pri_sniff_returns_h2_sentinel_preserving_bytes() {
        let io = scripted(vec![b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n"]);
        let mut reader = Reader::new(io, Http1Settings::default());
        let req = reader.get_request().await.unwrap();
        assert_eq!(req.header.method, Method::Pri);
        assert_eq!(req.header.target, "*");
        let leftover = reader.take_buffered();
        assert_eq!(&leftover[..], b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n");
    }

    #[tokio::test]
    async fn clean_close_before_any_bytes_is_connection_close() {
        let io = scripted(vec![]);
        let mut reader = Reader::new(io, Http1Settings::default());
        assert!(matches!(
            reader.get_request().await.unwrap_err(),
            WeftError::ConnectionClose
        ));
    }

    #[tokio::test]
    async fn chunked_request_streams_via_get_chunk_data() {
        let io = scripted(vec![
            b"POST /a HTTP/1.1\r\nHost: t\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nHi\r\n0\r\n\r\n",
        ]);
        let mut reader = Reader::new(io, Http1Settings::default());
        let req = reader.get_request().await.unwrap();
        assert!(req.body.is_empty());
        let mut decoder = ChunkedDecoder::new();
        let first = reader.get_chunk_data(&mut decoder).await.unwrap();
        assert_eq!(first, Some(b"Hi".to_vec()));
        let second = reader.get_chunk_data(&mut decoder).await.unwrap();
        assert_eq!(second, None);
    }
}
