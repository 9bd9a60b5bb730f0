//! Per-stream state machine (RFC 7540 §5.1), simplified from
//! `rama-http-core/src/h2/proto/streams/state.rs`'s `Inner` enum to the
//! transitions spec §4.6 actually names — this server never sends
//! PUSH_PROMISE, so `ReservedLocal` is reachable only in the (rejected)
//! receive direction and `ReservedRemote` is unused.

use crate::error::Error as FrameError;
use crate::flow::Window;
use bytes::BytesMut;
use weft_types::Reason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    ReservedLocal,
    ReservedRemote,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

impl StreamState {
    /// HEADERS received from the peer opening the stream.
    pub fn recv_headers(self, end_stream: bool) -> Result<Self, FrameError> {
        match self {
            StreamState::Idle => Ok(if end_stream {
                StreamState::HalfClosedRemote
            } else {
                StreamState::Open
            }),
            StreamState::ReservedLocal if !end_stream => Ok(StreamState::ReservedLocal),
            _ => Err(FrameError::MalformedMessage),
        }
    }

    /// `END_STREAM` observed from the peer on a DATA or trailing HEADERS
    /// frame.
    pub fn recv_end_stream(self) -> Self {
        match self {
            StreamState::Open => StreamState::HalfClosedRemote,
            StreamState::HalfClosedLocal => StreamState::Closed,
            other => other,
        }
    }

    /// `END_STREAM` set on a frame this side is sending.
    pub fn send_end_stream(self) -> Self {
        match self {
            StreamState::Open => StreamState::HalfClosedLocal,
            StreamState::HalfClosedRemote => StreamState::Closed,
            other => other,
        }
    }

    /// RST_STREAM, sent or received, always closes the stream immediately.
    pub fn reset(self) -> Self {
        StreamState::Closed
    }

    /// Whether DATA/HEADERS may still be accepted from the peer (the
    /// remote half isn't closed yet).
    pub fn can_recv(self) -> bool {
        matches!(
            self,
            StreamState::Open | StreamState::HalfClosedLocal | StreamState::Idle
        )
    }

    pub fn can_send(self) -> bool {
        matches!(
            self,
            StreamState::Open | StreamState::HalfClosedRemote | StreamState::ReservedLocal
        )
    }

    pub fn is_closed(self) -> bool {
        matches!(self, StreamState::Closed)
    }
}

/// A single HTTP/2 stream's accumulated state, grounded in spec §3's
/// "HTTP/2 stream" data model entry.
#[derive(Debug)]
pub struct Stream {
    pub id: u32,
    pub state: StreamState,
    pub send_window: Window,
    pub recv_window: Window,
    pub dependency_id: u32,
    pub weight: u8,
    pub exclusive: bool,
    pub header_block: BytesMut,
    pub received_data: BytesMut,
    pub error: Option<Reason>,
}

impl Stream {
    /// `send_initial` governs `send_window` (bounded by the peer's
    /// advertised `INITIAL_WINDOW_SIZE`); `recv_initial` governs
    /// `recv_window` (our own). They coincide only when both sides happen
    /// to advertise the same value.
    pub fn new(id: u32, send_initial: u32, recv_initial: u32) -> Self {
        Self {
            id,
            state: StreamState::Idle,
            send_window: Window::new(send_initial),
            recv_window: Window::new(recv_initial),
            dependency_id: 0,
            weight: 16,
            exclusive: false,
            header_block: BytesMut::new(),
            received_data: BytesMut::new(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_to_open_on_headers_without_end_stream() {
        assert_eq!(
            StreamState::Idle.recv_headers(false).unwrap(),
            StreamState::Open
        );
    }

    #[test]
    fn open_to_half_closed_remote_on_recv_end_stream() {
        assert_eq!(StreamState::Open.recv_end_stream(), StreamState::HalfClosedRemote);
    }

    #[test]
    fn half_closed_local_to_closed_on_recv_end_stream() {
        assert_eq!(StreamState::HalfClosedLocal.recv_end_stream(), StreamState::Closed);
    }

    #[test]
    fn half_closed_remote_to_closed_on_send_end_stream() {
        assert_eq!(
            StreamState::HalfClosedRemote.send_end_stream(),
            StreamState::Closed
        );
    }

    #[test]
    fn reset_always_closes() {
        assert_eq!(StreamState::Open.reset(), StreamState::Closed);
        assert_eq!(StreamState::Idle.reset(), StreamState::Closed);
    }
}
