//! The user callback surface the connection loop drives (spec §4.7): one
//! suspending method per dispatched frame kind, mirroring the
//! `Http2Callbacks` struct-of-coroutines in
//! `examples/original_source/galay-http/kernel/http2/Http2Callbacks.h`,
//! reshaped as a single async trait the way `weft_core::Route` does for
//! HTTP/1.1.
//!
//! Only [`Callbacks::on_headers`] and [`Callbacks::on_data`] are required;
//! every other method has a no-op default, matching the original's
//! `std::function` fields being individually optional.

use crate::conn::StreamHandle;
use crate::error::StreamError;
use async_trait::async_trait;
use bytes::Bytes;
use weft_types::{Reason, RequestHeader};

/// Invoked once a HEADERS (+ any CONTINUATION) block has been fully
/// reassembled and HPACK-decoded for the stream identified by `stream`.
/// `stream` also carries the write-back channel a handler uses to respond
/// (`StreamHandle::send_headers`/`send_data`/`reset`) — a plain, cloneable
/// handle standing in for the original's `shared_ptr<Stream>` callback
/// argument.
#[async_trait]
pub trait Callbacks: Send + Sync {
    async fn on_headers(&self, stream: StreamHandle, request: RequestHeader, end_stream: bool);

    async fn on_data(&self, stream: StreamHandle, data: Bytes, end_stream: bool);

    async fn on_settings(&self, _applied: crate::settings::SettingsConfig) {}

    async fn on_ping(&self, _payload: [u8; 8], _is_ack: bool) {}

    async fn on_goaway(&self, _last_stream_id: u32, _reason: Reason) {}

    async fn on_window_update(&self, _stream_id: u32, _increment: u32) {}

    async fn on_rst_stream(&self, _stream_id: u32, _reason: Reason) {}

    async fn on_priority(&self, _stream_id: u32, _dependency_id: u32, _weight: u8, _exclusive: bool) {}

    async fn on_error(&self, _err: &StreamError) {}
}
