//! The per-connection stream table: id allocation/validation, concurrency
//! limiting, and lookup — grounded in spec §3's stream invariants
//! ("strictly greater", "active ≤ MAX_CONCURRENT_STREAMS") and in the
//! overall shape of `rama-http-core/src/h2/proto/streams/`'s `Store`.

use crate::stream::Stream;
use indexmap::IndexMap;
use weft_types::Reason;

#[derive(Debug, thiserror::Error)]
pub enum StreamsError {
    #[error("stream id {0} is not strictly greater than the last client-initiated stream id")]
    NonMonotonicStreamId(u32),
    #[error("active stream count would exceed the configured concurrency limit")]
    ConcurrencyLimitExceeded,
    #[error("31-bit stream id space is exhausted")]
    StreamIdSpaceExhausted,
}

impl StreamsError {
    pub fn reason(&self) -> Reason {
        match self {
            StreamsError::NonMonotonicStreamId(_) => Reason::ProtocolError,
            StreamsError::ConcurrencyLimitExceeded => Reason::RefusedStream,
            StreamsError::StreamIdSpaceExhausted => Reason::NoError,
        }
    }
}

const MAX_STREAM_ID: u32 = (1 << 31) - 1;

pub struct StreamManager {
    streams: IndexMap<u32, Stream>,
    last_client_stream_id: u32,
    max_concurrent_streams: u32,
    /// Initial `recv_window` for newly created streams — our own
    /// `INITIAL_WINDOW_SIZE`, the value we advertised to the peer.
    local_initial_window_size: u32,
    /// Initial `send_window` for newly created streams — the peer's
    /// `INITIAL_WINDOW_SIZE` (RFC default 65535 until their SETTINGS
    /// arrives). Kept separate from `local_initial_window_size` so a stream
    /// opened after the peer changes its value doesn't inherit ours by
    /// mistake.
    peer_initial_window_size: u32,
    /// Set once a GOAWAY has been sent or a stream id wraps; no further
    /// streams may be created locally (spec §9: "stream-id exhaustion sends
    /// GOAWAY and stops creating new streams rather than wrapping").
    exhausted: bool,
}

impl StreamManager {
    pub fn new(max_concurrent_streams: u32, local_initial_window_size: u32) -> Self {
        Self {
            streams: IndexMap::new(),
            last_client_stream_id: 0,
            max_concurrent_streams,
            local_initial_window_size,
            peer_initial_window_size: crate::settings::DEFAULT_INITIAL_WINDOW_SIZE,
            exhausted: false,
        }
    }

    pub fn set_initial_window_size(&mut self, size: u32) {
        self.local_initial_window_size = size;
    }

    /// Updates the initial `send_window` future streams are created with,
    /// called whenever the peer's SETTINGS `INITIAL_WINDOW_SIZE` changes.
    /// Existing streams are adjusted separately via
    /// `Window::apply_settings_delta` (spec §4.7).
    pub fn set_peer_initial_window_size(&mut self, size: u32) {
        self.peer_initial_window_size = size;
    }

    pub fn set_max_concurrent_streams(&mut self, max: u32) {
        self.max_concurrent_streams = max;
    }

    fn active_count(&self) -> usize {
        self.streams.values().filter(|s| !s.state.is_closed()).count()
    }

    /// Accepts a client-initiated stream id from a HEADERS frame, enforcing
    /// strict monotonicity and the concurrency ceiling.
    pub fn accept_client_stream(&mut self, stream_id: u32) -> Result<&mut Stream, StreamsError> {
        if self.exhausted {
            return Err(StreamsError::StreamIdSpaceExhausted);
        }
        if stream_id == 0 || stream_id % 2 == 0 || stream_id <= self.last_client_stream_id {
            return Err(StreamsError::NonMonotonicStreamId(stream_id));
        }
        if self.active_count() as u32 >= self.max_concurrent_streams {
            return Err(StreamsError::ConcurrencyLimitExceeded);
        }
        if stream_id >= MAX_STREAM_ID {
            self.exhausted = true;
        }
        self.last_client_stream_id = stream_id;
        let stream = Stream::new(stream_id, self.peer_initial_window_size, self.local_initial_window_size);
        Ok(self.streams.entry(stream_id).or_insert(stream))
    }

    pub fn get_mut(&mut self, stream_id: u32) -> Option<&mut Stream> {
        self.streams.get_mut(&stream_id)
    }

    pub fn get(&self, stream_id: u32) -> Option<&Stream> {
        self.streams.get(&stream_id)
    }

    pub fn remove(&mut self, stream_id: u32) -> Option<Stream> {
        self.streams.shift_remove(&stream_id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Stream> {
        self.streams.values_mut()
    }

    pub fn highest_processed_stream_id(&self) -> u32 {
        self.last_client_stream_id
    }

    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }
}
