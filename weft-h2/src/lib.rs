//! HTTP/2 (RFC 7540) frame codec, stream state machine, dual-level flow
//! control, priority scheduler, and the server connection loop.
//!
//! Module layout is grounded in `rama-http-core`'s `h2::frame`/`h2::proto`
//! split (frame kinds each own a file under [`frame`], the stream table and
//! scheduler are separate modules) joined with the connection-loop shape of
//! `galay-http/server/Http2Server.cc`'s `processHttp2Frames` (send SETTINGS,
//! read the preface, then dispatch frames in a single loop per §4.7).

pub mod callbacks;
pub mod conn;
pub mod conv;
pub mod error;
pub mod flow;
pub mod frame;
pub mod scheduler;
pub mod settings;
pub mod stream;
pub mod streams;

pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

pub use callbacks::Callbacks;
pub use conn::{Connection, ConnectionConfig, StreamHandle};
pub use error::{ConnectionError, Error as FrameError, StreamError};
pub use frame::{Frame, Head, Kind};
pub use settings::SettingsConfig;
pub use stream::{Stream, StreamState};
pub use streams::StreamManager;
