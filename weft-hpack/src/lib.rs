//! HPACK (RFC 7541) header compression, used by `weft-h2` to decode and
//! encode HTTP/2 HEADERS/CONTINUATION blocks.
//!
//! Module layout mirrors `rama-http-core::h2::hpack`: `decoder`/`encoder`
//! own the instruction dispatch, `header` is the shared decoded-field type,
//! `huffman`/`huffman_table` the Huffman codec and its RFC 7541 Appendix B
//! data, and `table`/`static_table` the dynamic and static header tables.

mod decoder;
mod encoder;
mod header;
mod huffman;
mod huffman_table;
mod primitive;
mod static_table;
mod table;

pub use decoder::{Decoder, DecoderError};
pub use encoder::Encoder;
pub use header::{Header, Indexing};
pub use primitive::{IntegerDecodeError, StringDecodeError};
