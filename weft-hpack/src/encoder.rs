//! The HPACK encoder: picks the smallest valid representation for each
//! header field (indexed, name-indexed literal, or fully-literal),
//! consulting the static table then the dynamic table in that order, as
//! `galay-http`'s `findExactMatch`/`findNameMatch` pair does.

use crate::header::{Header, Indexing};
use crate::primitive::{encode_int, encode_string};
use crate::static_table;
use crate::table::DynamicTable;

pub struct Encoder {
    dynamic: DynamicTable,
    /// Queued size-update value to emit before the next header block, set
    /// by [`Encoder::set_max_dynamic_table_size`].
    pending_size_update: Option<usize>,
}

impl Encoder {
    pub fn new(max_dynamic_size: usize) -> Self {
        Self {
            dynamic: DynamicTable::new(max_dynamic_size),
            pending_size_update: None,
        }
    }

    /// Applied locally immediately but only takes effect on the wire at the
    /// start of the next encoded block (RFC 7541 §6.3).
    pub fn set_max_dynamic_table_size(&mut self, new_size: usize) {
        self.pending_size_update = Some(new_size);
    }

    pub fn encode_block(&mut self, headers: &[Header], out: &mut Vec<u8>) {
        if let Some(new_size) = self.pending_size_update.take() {
            encode_int(out, 0x20, 5, new_size);
            self.dynamic.set_max_size(new_size);
        }
        for header in headers {
            self.encode_one(header, out);
        }
    }

    fn encode_one(&mut self, header: &Header, out: &mut Vec<u8>) {
        if matches!(header.indexing, Indexing::Indexed) {
            if let Some(index) = static_table::find_exact_match(&header.name, &header.value) {
                encode_int(out, 0x80, 7, index);
                return;
            }
            if let Some(index) = self.dynamic.find_exact_match(&header.name, &header.value) {
                encode_int(out, 0x80, 7, index + static_table::STATIC_TABLE_LEN);
                return;
            }
        }

        let (first_byte_flag, prefix_bits) = match header.indexing {
            Indexing::Indexed => (0x40, 6),
            Indexing::NotIndexed => (0x00, 4),
            Indexing::NeverIndexed => (0x10, 4),
        };

        let name_index = static_table::find_name_match(&header.name).or_else(|| {
            self.dynamic
                .find_name_match(&header.name)
                .map(|i| i + static_table::STATIC_TABLE_LEN)
        });

        match name_index {
            Some(index) => encode_int(out, first_byte_flag, prefix_bits, index),
            None => {
                encode_int(out, first_byte_flag, prefix_bits, 0);
                encode_string(out, &header.name);
            }
        }
        encode_string(out, &header.value);

        if matches!(header.indexing, Indexing::Indexed) {
            self.dynamic.insert(header.name.clone(), header.value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;

    #[test]
    fn encode_decode_round_trip_mixed_indexing() {
        let headers = vec![
            Header::new(":method", "GET", Indexing::Indexed),
            Header::new(":path", "/", Indexing::Indexed),
            Header::new("x-custom", "value-one", Indexing::Indexed),
            Header::new("authorization", "secret-token", Indexing::NeverIndexed),
        ];
        let mut encoder = Encoder::new(4096);
        let mut wire = Vec::new();
        encoder.encode_block(&headers, &mut wire);

        let mut decoder = Decoder::new(4096);
        let mut decoded = Vec::new();
        decoder.decode_block(&wire, &mut decoded).unwrap();

        let pairs: Vec<_> = decoded.iter().map(|h| (h.name.as_str(), h.value.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                (":method", "GET"),
                (":path", "/"),
                ("x-custom", "value-one"),
                ("authorization", "secret-token"),
            ]
        );
    }

    #[test]
    fn repeated_header_uses_dynamic_table_indexed_reference() {
        let headers = vec![Header::new("x-custom", "value-one", Indexing::Indexed)];
        let mut encoder = Encoder::new(4096);
        let mut first = Vec::new();
        encoder.encode_block(&headers, &mut first);
        let mut second = Vec::new();
        encoder.encode_block(&headers, &mut second);
        // Second encode should be a single indexed byte (plus possible
        // multi-byte index), much shorter than the first literal encoding.
        assert!(second.len() < first.len());
    }
}
