//! WebSocket (RFC 6455) framing: frame parse/emit over scatter-gather
//! buffers, strict UTF-8 validation for Text frames, and handshake
//! accept-key computation.
//!
//! Grounded throughout in `galay-http/protoc/websocket/WebSocketFrame.cc`.

mod error;
mod frame;
mod handshake;
mod opcode;
mod utf8;

pub use error::WsError;
pub use frame::{from_iovec, to_bytes, Frame, FrameHeader};
pub use handshake::accept_key;
pub use opcode::Opcode;
