use weft_types::Reason;

/// Frame-parse and protocol-validation errors, grounded in
/// `rama-http-core/src/h2/frame/mod.rs`'s `Error` enum — the variant names
/// are kept but the HPACK source type is swapped for `weft_hpack`'s.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("frame length does not match what this frame type requires")]
    BadFrameSize,
    #[error("pad length is greater than or equal to the remaining payload")]
    TooMuchPadding,
    #[error("SETTINGS value is out of the valid range for that identifier")]
    InvalidSettingValue,
    #[error("WINDOW_UPDATE increment is zero or out of range")]
    InvalidWindowUpdateValue,
    #[error("payload length is invalid for this frame type")]
    InvalidPayloadLength,
    #[error("SETTINGS ACK frame carried a non-empty payload")]
    InvalidPayloadAckSettings,
    #[error("stream id is invalid for this frame type (e.g. 0 on a stream frame)")]
    InvalidStreamId,
    #[error("frame fields do not form a well-formed message")]
    MalformedMessage,
    #[error("PRIORITY dependency refers to the frame's own stream id")]
    InvalidDependencyId,
    #[error(transparent)]
    Hpack(#[from] weft_hpack::DecoderError),
}

/// A connection-fatal protocol violation: the error code to report on
/// GOAWAY plus, where relevant, the stream that triggered it.
#[derive(Debug, thiserror::Error)]
#[error("HTTP/2 connection error: {reason}")]
pub struct ConnectionError {
    pub reason: Reason,
}

impl ConnectionError {
    pub fn new(reason: Reason) -> Self {
        Self { reason }
    }
}

/// A stream-scoped violation: resolved with RST_STREAM rather than tearing
/// down the whole connection.
#[derive(Debug, thiserror::Error)]
#[error("HTTP/2 stream error on stream {stream_id}: {reason}")]
pub struct StreamError {
    pub stream_id: u32,
    pub reason: Reason,
}

impl StreamError {
    pub fn new(stream_id: u32, reason: Reason) -> Self {
        Self { stream_id, reason }
    }
}

impl From<Error> for ConnectionError {
    fn from(e: Error) -> Self {
        let reason = match e {
            Error::Hpack(_) => Reason::CompressionError,
            Error::InvalidWindowUpdateValue => Reason::FlowControlError,
            Error::InvalidSettingValue => Reason::ProtocolError,
            _ => Reason::ProtocolError,
        };
        ConnectionError::new(reason)
    }
}
