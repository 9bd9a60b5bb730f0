use crate::status::StatusCode;
use std::fmt;

/// The HTTP/2 error codes from RFC 7540 §11.4, used on RST_STREAM and GOAWAY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Reason {
    NoError = 0x0,
    ProtocolError = 0x1,
    InternalError = 0x2,
    FlowControlError = 0x3,
    SettingsTimeout = 0x4,
    StreamClosed = 0x5,
    FrameSizeError = 0x6,
    RefusedStream = 0x7,
    Cancel = 0x8,
    CompressionError = 0x9,
    ConnectError = 0xa,
    EnhanceYourCalm = 0xb,
    InadequateSecurity = 0xc,
    Http11Required = 0xd,
}

impl Reason {
    pub fn from_wire(code: u32) -> Self {
        match code {
            0x0 => Self::NoError,
            0x1 => Self::ProtocolError,
            0x2 => Self::InternalError,
            0x3 => Self::FlowControlError,
            0x4 => Self::SettingsTimeout,
            0x5 => Self::StreamClosed,
            0x6 => Self::FrameSizeError,
            0x7 => Self::RefusedStream,
            0x8 => Self::Cancel,
            0x9 => Self::CompressionError,
            0xa => Self::ConnectError,
            0xb => Self::EnhanceYourCalm,
            0xc => Self::InadequateSecurity,
            0xd => Self::Http11Required,
            _ => Self::InternalError,
        }
    }

    pub fn into_wire(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// WebSocket close codes used when the server tears a connection down due to
/// a protocol violation (RFC 6455 §7.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    Normal = 1000,
    GoingAway = 1001,
    ProtocolError = 1002,
    Unsupported = 1003,
    InvalidPayload = 1007,
    PolicyViolation = 1008,
    MessageTooBig = 1009,
    InternalError = 1011,
}

/// The unified error taxonomy threaded through all three protocol paths.
///
/// Every connection-task failure resolves to one of these; the dispatcher
/// maps HTTP/1.1 variants to a status-coded response, H2 variants to
/// RST_STREAM/GOAWAY with the carried [`Reason`], and WebSocket variants to a
/// Close frame with the carried [`CloseCode`].
#[derive(Debug, thiserror::Error)]
pub enum WeftError {
    // ---- transport ----
    #[error("error receiving from socket: {0}")]
    RecvError(#[source] std::io::Error),
    #[error("error sending to socket: {0}")]
    SendError(#[source] std::io::Error),
    #[error("timed out waiting to receive")]
    RecvTimeout,
    #[error("timed out waiting to send")]
    SendTimeout,
    #[error("peer closed the connection")]
    ConnectionClose,

    // ---- HTTP/1.1 ----
    #[error("malformed request")]
    BadRequest,
    #[error("request header exceeded the configured size limit")]
    HeaderTooLong,
    #[error("request has a body but no usable Content-Length")]
    ContentLengthNotContained,
    #[error("Content-Length header is not a valid non-negative integer")]
    ContentLengthConvertError,
    #[error("unsupported HTTP version")]
    VersionNotSupport,
    #[error("chunk size is not a valid hex integer")]
    InvalidChunkLength,
    #[error("chunked body does not follow chunk grammar")]
    InvalidChunkFormat,
    #[error("no route matches the request")]
    NotFound,
    #[error("route exists but not for this method")]
    MethodNotAllowed,
    #[error("access to the resource is forbidden")]
    Forbidden,
    #[error("requested range cannot be satisfied")]
    RangeNotSatisfiable,
    #[error("internal server error: {0}")]
    InternalServerError(String),

    // ---- HTTP/2 ----
    #[error("HTTP/2 stream error: {reason}")]
    StreamError { reason: Reason },
    #[error("HTTP/2 connection error: {reason}")]
    ConnectionError { reason: Reason },
    #[error("HPACK compression error")]
    Hpack(Reason),

    // ---- WebSocket ----
    #[error("websocket protocol violation")]
    WebSocket(CloseCode),
}

impl WeftError {
    /// Maps an HTTP/1.1-classifiable error to its wire status code, or
    /// `None` when the error isn't a plain HTTP/1.1 condition (transport
    /// failures, H2/WS errors are terminal by other means).
    pub fn status_code(&self) -> Option<StatusCode> {
        Some(match self {
            Self::BadRequest
            | Self::ContentLengthConvertError
            | Self::InvalidChunkLength
            | Self::InvalidChunkFormat => StatusCode::BAD_REQUEST,
            Self::HeaderTooLong => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            Self::ContentLengthNotContained => StatusCode::LENGTH_REQUIRED,
            Self::VersionNotSupport => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => return None,
        })
    }

    /// Whether the connection must be closed after reporting this error
    /// (keep-alive cannot continue).
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::RecvError(_)
                | Self::SendError(_)
                | Self::RecvTimeout
                | Self::SendTimeout
                | Self::ConnectionClose
                | Self::HeaderTooLong
                | Self::VersionNotSupport
                | Self::ConnectionError { .. }
        )
    }
}

impl From<std::io::Error> for WeftError {
    fn from(e: std::io::Error) -> Self {
        Self::RecvError(e)
    }
}
