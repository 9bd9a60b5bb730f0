//! Tuning knobs for the reader/writer, grounded in
//! `galay-http/kernel/http/HttpReaderSetting.h` / `HttpWriterSetting.h` —
//! the same plain-getter/setter config object, reshaped as a builder-style
//! Rust struct the way `weft-h2::ConnectionConfig` does for HTTP/2.

use std::time::Duration;

/// Settings governing the HTTP/1.1 reader and writer for one connection
/// (spec §3's "HTTP/1.1 settings" list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Http1Settings {
    pub recv_timeout: Option<Duration>,
    pub send_timeout: Option<Duration>,
    pub recv_incr_length: usize,
    pub max_header_size: usize,
    pub chunk_buffer_size: usize,
    pub use_chunked_transfer: bool,
    pub use_sendfile: bool,
    pub sendfile_chunk_size: usize,
    pub support_range: bool,
}

impl Default for Http1Settings {
    fn default() -> Self {
        Self {
            recv_timeout: None,
            send_timeout: None,
            recv_incr_length: 1024,
            max_header_size: 8192,
            chunk_buffer_size: 2048,
            use_chunked_transfer: true,
            use_sendfile: true,
            sendfile_chunk_size: 64 * 1024,
            support_range: true,
        }
    }
}

impl Http1Settings {
    pub fn with_recv_timeout(mut self, d: Option<Duration>) -> Self {
        self.recv_timeout = d;
        self
    }

    pub fn with_send_timeout(mut self, d: Option<Duration>) -> Self {
        self.send_timeout = d;
        self
    }

    pub fn with_max_header_size(mut self, n: usize) -> Self {
        self.max_header_size = n;
        self
    }

    pub fn with_recv_incr_length(mut self, n: usize) -> Self {
        self.recv_incr_length = n;
        self
    }

    pub fn with_chunk_buffer_size(mut self, n: usize) -> Self {
        self.chunk_buffer_size = n;
        self
    }
}
