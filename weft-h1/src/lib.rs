//! The HTTP/1.1 message reader/writer state machine: incremental header
//! parsing with bounded memory, Content-Length vs. chunked body framing,
//! keep-alive lifecycle, and WebSocket/h2c upgrade handshakes (spec §4.1,
//! §4.2).
//!
//! Grounded throughout in `galay-http/HttpReader.cc`/`HttpWriter.cc` and
//! `galay-http/kernel/http/HttpReaderSetting.h`, with the header/body
//! scanning upgraded to `httparse` + `memchr` the way
//! `rama-http-core/src/proto/h1` does it.

pub mod chunked;
pub mod reader;
pub mod settings;
pub mod writer;

pub use chunked::ChunkedDecoder;
pub use reader::Reader;
pub use settings::Http1Settings;
pub use writer::Writer;
