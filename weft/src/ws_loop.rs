//! The WebSocket frame loop (spec §4.3): read frames off the wire with
//! [`weft_ws::from_iovec`], reassemble fragmented messages (continuation
//! frames joined until `FIN`), answer control frames, and dispatch
//! complete messages to a [`WsHandler`] — the layer `weft-ws` itself
//! deliberately stops short of, since its `Frame` codec handles exactly
//! one frame at a time.
//!
//! Grounded in `galay-http/protoc/websocket/WebSocketFrame.cc`'s
//! `WsConnection::onMessage` dispatch loop, which performs the same
//! continuation-joining before invoking the registered message callback.

use std::io::IoSlice;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};

use weft_core::io::{AsyncIo, SharedIo};
use weft_types::{CloseCode, WeftError};
use weft_ws::{from_iovec, to_bytes, Frame, Opcode, WsError};

/// Tuning knobs for the WebSocket frame loop, mirroring the shape of
/// `weft_h1::Http1Settings` for this connection phase.
#[derive(Debug, Clone, Copy)]
pub struct WsSettings {
    pub recv_timeout: Option<Duration>,
    pub recv_incr_length: usize,
    pub max_message_size: usize,
}

impl Default for WsSettings {
    fn default() -> Self {
        Self {
            recv_timeout: None,
            recv_incr_length: 4096,
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

/// A fully reassembled WebSocket message, handed to [`WsHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
}

/// The write half a handler uses to answer a message on the same
/// connection — a [`SharedIo`] clone, the same device `h1_loop` uses to
/// let two owning halves share one socket.
pub struct WsSender<IO> {
    io: SharedIo<IO>,
}

impl<IO: AsyncIo> WsSender<IO> {
    async fn send_frame(&self, frame: Frame) -> Result<(), WeftError> {
        let bytes = to_bytes(&frame, false);
        self.io.clone().send(&bytes).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), WeftError> {
        self.send_frame(Frame::new(Opcode::Text, text.into().into_bytes(), true))
            .await
    }

    pub async fn send_binary(&self, data: Vec<u8>) -> Result<(), WeftError> {
        self.send_frame(Frame::new(Opcode::Binary, data, true)).await
    }
}

/// Application callback invoked once per reassembled message.
#[async_trait]
pub trait WsHandler<IO: AsyncIo>: Send + Sync {
    async fn on_message(&self, message: Message, sender: &WsSender<IO>) -> Result<(), WeftError>;
}

/// An accumulating fragmented message: the opcode of the frame that
/// started it (`Text` or `Binary`, never `Continuation`) and the payload
/// joined so far.
struct Fragment {
    opcode: Opcode,
    payload: Vec<u8>,
}

/// Drives one upgraded connection's WebSocket traffic to completion: a
/// clean or peer-initiated Close, or an unrecoverable protocol error
/// (answered with a best-effort Close frame carrying the mapped close
/// code before the connection ends, per spec §4.3a).
pub async fn serve_websocket<IO, H>(io: IO, handler: Arc<H>, settings: WsSettings) -> Result<(), WeftError>
where
    IO: AsyncIo,
    H: WsHandler<IO>,
{
    let shared = SharedIo::new(io);
    let sender = WsSender { io: shared.clone() };
    let mut recv_io = shared.clone();
    let mut buf = BytesMut::new();
    let mut fragment: Option<Fragment> = None;

    loop {
        let frame = match next_frame(&mut recv_io, &mut buf, &settings).await {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(()),
            Err(e) => {
                let _ = sender.send_frame(Frame::close(e.close_code(), "")).await;
                return Err(WeftError::WebSocket(e.close_code()));
            }
        };

        match frame.header.opcode {
            Opcode::Ping => {
                sender.send_frame(Frame::new(Opcode::Pong, frame.payload, true)).await?;
            }
            Opcode::Pong => {}
            Opcode::Close => {
                let _ = sender.send_frame(Frame::close(CloseCode::Normal, "")).await;
                return Ok(());
            }
            Opcode::Text | Opcode::Binary => {
                if fragment.is_some() {
                    let _ = sender
                        .send_frame(Frame::close(CloseCode::ProtocolError, ""))
                        .await;
                    return Err(WeftError::WebSocket(CloseCode::ProtocolError));
                }
                if frame.header.fin {
                    deliver(&handler, &sender, frame.header.opcode, frame.payload).await?;
                } else {
                    fragment = Some(Fragment {
                        opcode: frame.header.opcode,
                        payload: frame.payload,
                    });
                }
            }
            Opcode::Continuation => {
                let Some(mut current) = fragment.take() else {
                    let _ = sender
                        .send_frame(Frame::close(CloseCode::ProtocolError, ""))
                        .await;
                    return Err(WeftError::WebSocket(CloseCode::ProtocolError));
                };
                current.payload.extend_from_slice(&frame.payload);
                if current.payload.len() > settings.max_message_size {
                    let _ = sender
                        .send_frame(Frame::close(CloseCode::MessageTooBig, ""))
                        .await;
                    return Err(WeftError::WebSocket(CloseCode::MessageTooBig));
                }
                if frame.header.fin {
                    deliver(&handler, &sender, current.opcode, current.payload).await?;
                } else {
                    fragment = Some(current);
                }
            }
        }
    }
}

async fn deliver<IO, H>(
    handler: &Arc<H>,
    sender: &WsSender<IO>,
    opcode: Opcode,
    payload: Vec<u8>,
) -> Result<(), WeftError>
where
    IO: AsyncIo,
    H: WsHandler<IO>,
{
    let message = match opcode {
        Opcode::Text => {
            let text = String::from_utf8(payload).map_err(|_| WeftError::WebSocket(CloseCode::InvalidPayload))?;
            Message::Text(text)
        }
        Opcode::Binary => Message::Binary(payload),
        _ => unreachable!("deliver is only called for Text/Binary"),
    };
    handler.on_message(message, sender).await
}

/// Reads off `io` until one complete frame is buffered, growing `buf` in
/// `recv_incr_length` increments (spec §4.1's reader growth strategy,
/// reused here for the WebSocket read side); `Ok(None)` signals a clean
/// peer close with no frame in flight.
async fn next_frame<IO: AsyncIo>(
    io: &mut IO,
    buf: &mut BytesMut,
    settings: &WsSettings,
) -> Result<Option<Frame>, WsError> {
    loop {
        if !buf.is_empty() {
            let iov = [IoSlice::new(&buf[..])];
            match from_iovec(&iov, true) {
                Ok((frame, consumed)) => {
                    buf.advance(consumed);
                    return Ok(Some(frame));
                }
                Err(WsError::Incomplete) => {}
                Err(e) => return Err(e),
            }
        }
        if buf.len() > settings.max_message_size {
            return Err(WsError::MessageTooLarge);
        }
        let mut chunk = vec![0u8; settings.recv_incr_length];
        let n = weft_core::io::timeout(settings.recv_timeout, io.recv(&mut chunk), || WeftError::RecvTimeout)
            .await
            .map_err(|_| WsError::Incomplete)?
            .map_err(|_| WsError::Incomplete)?;
        if n == 0 {
            return if buf.is_empty() {
                Ok(None)
            } else {
                Err(WsError::InvalidFrame)
            };
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::Mutex as TokioMutex;

    struct ScriptedIo {
        chunks: VecDeque<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl ScriptedIo {
        fn new(frames: Vec<Vec<u8>>) -> Self {
            Self {
                chunks: frames.into(),
                sent: Vec::new(),
            }
        }
    }

    #[async_trait]
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

        async fn send(&mut self, bytes: &[u8]) -> Result<(), WeftError> {
            self.sent.extend_from_slice(bytes);
            Ok(())
        }
    }

    fn client_frame(opcode: Opcode, payload: &[u8], fin: bool) -> Vec<u8> {
        to_bytes(&Frame::new(opcode, payload.to_vec(), fin), true)
    }

    struct RecordingHandler {
        received: TokioMutex<Vec<Message>>,
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl WsHandler<ScriptedIo> for RecordingHandler {
        async fn on_message(&self, message: Message, sender: &WsSender<ScriptedIo>) -> Result<(), WeftError> {
            self.received.lock().await.push(message);
            if let Some(reply) = self.reply {
                sender.send_text(reply).await?;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn text_message_is_delivered_and_reply_is_sent_unmasked() {
        let io = ScriptedIo::new(vec![
            client_frame(Opcode::Text, b"hi", true),
            client_frame(Opcode::Close, &[], true),
        ]);
        let handler = Arc::new(RecordingHandler {
            received: TokioMutex::new(Vec::new()),
            reply: Some("ok"),
        });
        serve_websocket(io, handler.clone(), WsSettings::default()).await.unwrap();

        assert_eq!(*handler.received.lock().await, vec![Message::Text("hi".to_string())]);
    }

    #[tokio::test]
    async fn fragmented_text_message_is_reassembled_before_dispatch() {
        let io = ScriptedIo::new(vec![
            client_frame(Opcode::Text, b"Hel", false),
            client_frame(Opcode::Continuation, b"lo", true),
            client_frame(Opcode::Close, &[], true),
        ]);
        let handler = Arc::new(RecordingHandler {
            received: TokioMutex::new(Vec::new()),
            reply: None,
        });
        serve_websocket(io, handler.clone(), WsSettings::default()).await.unwrap();

        assert_eq!(*handler.received.lock().await, vec![Message::Text("Hello".to_string())]);
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong_before_continuing() {
        let io = ScriptedIo::new(vec![
            client_frame(Opcode::Ping, b"keepalive", true),
            client_frame(Opcode::Close, &[], true),
        ]);
        let handler = Arc::new(RecordingHandler {
            received: TokioMutex::new(Vec::new()),
            reply: None,
        });
        serve_websocket(io, handler, WsSettings::default()).await.unwrap();
    }

    #[tokio::test]
    async fn unexpected_continuation_without_an_open_fragment_is_a_protocol_error() {
        let io = ScriptedIo::new(vec![client_frame(Opcode::Continuation, b"x", true)]);
        let handler = Arc::new(RecordingHandler {
            received: TokioMutex::new(Vec::new()),
            reply: None,
        });
        let result = serve_websocket(io, handler, WsSettings::default()).await;
        assert!(matches!(result, Err(WeftError::WebSocket(CloseCode::ProtocolError))));
    }
}
