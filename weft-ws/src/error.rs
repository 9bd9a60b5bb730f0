use weft_types::CloseCode;

/// Parse/emit failures for a single WebSocket frame, grounded in
/// `galay-http`'s `WsError`/`kWsXxx` taxonomy (`WebSocketFrame.cc`,
/// `WsFrameParser::fromIOVec`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WsError {
    #[error("not enough bytes buffered to parse this frame")]
    Incomplete,
    #[error("frame is structurally malformed")]
    InvalidFrame,
    #[error("reserved bits are set with no extension negotiated")]
    ReservedBitsSet,
    #[error("opcode is not a recognized data or control opcode")]
    InvalidOpcode,
    #[error("control frame is fragmented (FIN not set)")]
    ControlFrameFragmented,
    #[error("control frame payload exceeds 125 bytes")]
    ControlFrameTooLarge,
    #[error("server received an unmasked frame")]
    MaskRequired,
    #[error("client received a masked frame")]
    MaskNotAllowed,
    #[error("text frame payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("declared payload length is invalid")]
    InvalidPayloadLength,
    #[error("message exceeds the configured maximum size")]
    MessageTooLarge,
}

impl WsError {
    /// Maps a parse/validation failure to the close code the server should
    /// send before tearing the connection down (spec §4.3a table).
    pub fn close_code(self) -> CloseCode {
        match self {
            Self::InvalidFrame
            | Self::InvalidOpcode
            | Self::ControlFrameTooLarge
            | Self::ControlFrameFragmented
            | Self::ReservedBitsSet
            | Self::MaskRequired
            | Self::MaskNotAllowed => CloseCode::ProtocolError,
            Self::InvalidUtf8 | Self::InvalidPayloadLength => CloseCode::InvalidPayload,
            Self::MessageTooLarge => CloseCode::MessageTooBig,
            Self::Incomplete => CloseCode::InternalError,
        }
    }
}
