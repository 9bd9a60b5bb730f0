//! The HPACK decoder: dispatches on the first byte's bit pattern per RFC
//! 7541 §6, resolving each representation against the static table (first
//! 61 indices) then the connection's dynamic table.
//!
//! Grounded in `rama-http-core/src/h2/hpack/mod.rs`'s module boundary
//! (decoder owns its own file, reuses `header`/`table`/`primitive`) and in
//! `galay-http`'s static/dynamic table split for the index-space join.

use crate::header::{Header, Indexing};
use crate::primitive::{decode_int, decode_string, IntegerDecodeError, StringDecodeError};
use crate::static_table;
use crate::table::DynamicTable;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecoderError {
    #[error(transparent)]
    Integer(#[from] IntegerDecodeError),
    #[error(transparent)]
    String(#[from] StringDecodeError),
    #[error("header block references table index {0}, which is out of range")]
    InvalidIndex(usize),
    #[error("dynamic table size update to {requested} exceeds the negotiated maximum of {max}")]
    CompressionError { requested: usize, max: usize },
}

pub struct Decoder {
    dynamic: DynamicTable,
    max_dynamic_size: usize,
}

impl Decoder {
    pub fn new(max_dynamic_size: usize) -> Self {
        Self {
            dynamic: DynamicTable::new(max_dynamic_size),
            max_dynamic_size,
        }
    }

    pub fn dynamic_table_size(&self) -> usize {
        self.dynamic.max_size()
    }

    /// Decodes every header field in `block`, appending to `out`. `block`
    /// must contain a header block already reassembled from HEADERS plus
    /// any CONTINUATION frames — HPACK instructions cannot be interpreted
    /// until the full block is available, since table-size updates and
    /// indexed references apply across the whole sequence.
    pub fn decode_block(&mut self, block: &[u8], out: &mut Vec<Header>) -> Result<(), DecoderError> {
        let mut pos = 0;
        while pos < block.len() {
            let first = block[pos];
            let consumed = if first & 0x80 != 0 {
                self.decode_indexed(&block[pos..], out)?
            } else if first & 0x40 != 0 {
                self.decode_literal(&block[pos..], 6, Indexing::Indexed, out)?
            } else if first & 0x20 != 0 {
                self.decode_table_size_update(&block[pos..])?
            } else if first & 0x10 != 0 {
                self.decode_literal(&block[pos..], 4, Indexing::NeverIndexed, out)?
            } else {
                self.decode_literal(&block[pos..], 4, Indexing::NotIndexed, out)?
            };
            pos += consumed;
        }
        Ok(())
    }

    fn resolve(&self, index: usize) -> Option<(String, String)> {
        if index == 0 {
            return None;
        }
        if index <= static_table::STATIC_TABLE_LEN {
            static_table::get(index).map(|(n, v)| (n.to_owned(), v.to_owned()))
        } else {
            self.dynamic
                .get(index - static_table::STATIC_TABLE_LEN)
                .map(|(n, v)| (n.to_owned(), v.to_owned()))
        }
    }

    fn decode_indexed(&self, input: &[u8], out: &mut Vec<Header>) -> Result<usize, DecoderError> {
        let (index, consumed) = decode_int(input, 7)?;
        let (name, value) = self.resolve(index).ok_or(DecoderError::InvalidIndex(index))?;
        out.push(Header::new(name, value, Indexing::Indexed));
        Ok(consumed)
    }

    fn decode_literal(
        &mut self,
        input: &[u8],
        prefix_bits: u32,
        indexing: Indexing,
        out: &mut Vec<Header>,
    ) -> Result<usize, DecoderError> {
        let (index, mut consumed) = decode_int(input, prefix_bits)?;
        let name = if index == 0 {
            let (name, n) = decode_string(&input[consumed..])?;
            consumed += n;
            name
        } else {
            self.resolve(index)
                .ok_or(DecoderError::InvalidIndex(index))?
                .0
        };
        let (value, n) = decode_string(&input[consumed..])?;
        consumed += n;

        if matches!(indexing, Indexing::Indexed) {
            self.dynamic.insert(name.clone(), value.clone());
        }
        out.push(Header::new(name, value, indexing));
        Ok(consumed)
    }

    fn decode_table_size_update(&mut self, input: &[u8]) -> Result<usize, DecoderError> {
        let (new_size, consumed) = decode_int(input, 5)?;
        if new_size > self.max_dynamic_size {
            return Err(DecoderError::CompressionError {
                requested: new_size,
                max: self.max_dynamic_size,
            });
        }
        self.dynamic.set_max_size(new_size);
        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_rfc7541_c2_1_literal_with_indexing() {
        // RFC 7541 C.2.1: literal header field with incremental indexing,
        // indexed name? No — entirely new name "custom-key": "custom-header".
        let wire: [u8; 26] = [
            0x40, 0x0a, b'c', b'u', b's', b't', b'o', b'm', b'-', b'k', b'e', b'y', 0x0d, b'c',
            b'u', b's', b't', b'o', b'm', b'-', b'h', b'e', b'a', b'd', b'e', b'r',
        ];
        let mut decoder = Decoder::new(4096);
        let mut out = Vec::new();
        decoder.decode_block(&wire, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "custom-key");
        assert_eq!(out[0].value, "custom-header");
        assert_eq!(decoder.dynamic.len(), 1);
    }

    #[test]
    fn decodes_indexed_static_entry() {
        let wire = [0x82u8]; // index 2 = ":method: GET"
        let mut decoder = Decoder::new(4096);
        let mut out = Vec::new();
        decoder.decode_block(&wire, &mut out).unwrap();
        assert_eq!(out[0].name, ":method");
        assert_eq!(out[0].value, "GET");
    }

    #[test]
    fn invalid_index_is_rejected() {
        let mut decoder = Decoder::new(4096);
        let mut out = Vec::new();
        let wire = [0x80u8 | 0x7f, 0x00]; // index 127, no dynamic entries
        assert!(matches!(
            decoder.decode_block(&wire, &mut out),
            Err(DecoderError::InvalidIndex(_))
        ));
    }

    #[test]
    fn table_size_update_above_negotiated_max_is_a_compression_error() {
        let mut decoder = Decoder::new(4096);
        let mut out = Vec::new();
        let mut wire = Vec::new();
        crate::primitive::encode_int(&mut wire, 0x20, 5, 8192);
        assert_eq!(
            decoder.decode_block(&wire, &mut out),
            Err(DecoderError::CompressionError { requested: 8192, max: 4096 })
        );
    }

    #[test]
    fn table_size_update_at_negotiated_max_is_accepted() {
        let mut decoder = Decoder::new(4096);
        let mut out = Vec::new();
        let mut wire = Vec::new();
        crate::primitive::encode_int(&mut wire, 0x20, 5, 4096);
        decoder.decode_block(&wire, &mut out).unwrap();
        assert_eq!(decoder.dynamic_table_size(), 4096);
    }
}
