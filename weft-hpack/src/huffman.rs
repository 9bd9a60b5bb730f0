//! Huffman encode/decode over [`huffman_table::HUFFMAN_CODES`], grounded in
//! the same original implementation as the table itself
//! (`galay-http/protoc/http2/Http2Huffman.cc`'s `encode`/`decode`): encoding
//! walks a bit accumulator MSB-first per symbol, decoding walks a trie built
//! once from the code table and matches bit-by-bit.

use crate::huffman_table::HUFFMAN_CODES;
use std::sync::OnceLock;

const EOS_SYMBOL: usize = 256;

/// Encodes `input` bytes into the Huffman representation used by HPACK
/// string literals, padding the final byte with 1-bits (the high-order
/// bits of the EOS code), per RFC 7541 §5.2.
pub(crate) fn encode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut acc: u64 = 0;
    let mut acc_bits: u32 = 0;

    for &byte in input {
        let (code, len) = HUFFMAN_CODES[byte as usize];
        acc = (acc << len) | code as u64;
        acc_bits += len as u32;
        while acc_bits >= 8 {
            acc_bits -= 8;
            out.push((acc >> acc_bits) as u8);
        }
    }

    if acc_bits > 0 {
        let pad_len = 8 - acc_bits;
        let padded = (acc << pad_len) | ((1u64 << pad_len) - 1);
        out.push(padded as u8);
    }

    out
}

/// Exact encoded length in bytes, used to decide whether Huffman-coding a
/// string literal is smaller than sending it raw (HPACK does not mandate
/// Huffman, only permits it).
pub(crate) fn encoded_len(input: &[u8]) -> usize {
    let bits: usize = input
        .iter()
        .map(|&b| HUFFMAN_CODES[b as usize].1 as usize)
        .sum();
    (bits + 7) / 8
}

struct Node {
    /// `Some(symbol)` at a leaf; both children empty at a leaf.
    symbol: Option<u16>,
    children: [Option<Box<Node>>; 2],
}

impl Node {
    fn branch() -> Self {
        Self {
            symbol: None,
            children: [None, None],
        }
    }
}

fn build_trie() -> Node {
    let mut root = Node::branch();
    for (symbol, &(code, len)) in HUFFMAN_CODES.iter().enumerate() {
        let mut node = &mut root;
        for bit_pos in (0..len).rev() {
            let bit = ((code >> bit_pos) & 1) as usize;
            node = node.children[bit].get_or_insert_with(|| Box::new(Node::branch()));
        }
        node.symbol = Some(symbol as u16);
    }
    root
}

fn trie() -> &'static Node {
    static TRIE: OnceLock<Node> = OnceLock::new();
    TRIE.get_or_init(build_trie)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HuffmanDecodeError {
    #[error("huffman stream decoded the EOS symbol, which is only valid as padding")]
    EosInStream,
    #[error("huffman stream padding is not all 1-bits")]
    InvalidPadding,
    #[error("huffman stream ended mid-codepoint")]
    Truncated,
}

/// Decodes a Huffman-coded string literal, rejecting a decoded EOS symbol
/// and padding that isn't all-1s (RFC 7541 §5.2: "A padding strictly longer
/// than 7 bits MUST be treated as a decoding error. ... Padding not
/// corresponding to the most significant bits of the code for the EOS
/// symbol MUST be treated as a decoding error.").
pub(crate) fn decode(input: &[u8]) -> Result<Vec<u8>, HuffmanDecodeError> {
    let root = trie();
    let mut out = Vec::with_capacity(input.len() * 2);
    let mut node = root;
    // Bits consumed and 1-bits consumed since the last completed symbol (or
    // start); used to validate the trailing padding once the stream ends.
    let mut bits_since_leaf = 0u32;
    let mut ones_since_leaf = 0u32;

    for &byte in input {
        for bit_pos in (0..8).rev() {
            let bit = ((byte >> bit_pos) & 1) as usize;
            match &node.children[bit] {
                Some(next) => node = next,
                None => return Err(HuffmanDecodeError::Truncated),
            }
            bits_since_leaf += 1;
            ones_since_leaf += bit as u32;
            if let Some(symbol) = node.symbol {
                if symbol as usize == EOS_SYMBOL {
                    return Err(HuffmanDecodeError::EosInStream);
                }
                out.push(symbol as u8);
                node = root;
                bits_since_leaf = 0;
                ones_since_leaf = 0;
            }
        }
    }

    // Trailing bits (if any) must be at most 7 bits, all 1, matching the
    // high-order bits of the EOS code (RFC 7541 §5.2).
    if bits_since_leaf > 0 && (bits_since_leaf > 7 || ones_since_leaf != bits_since_leaf) {
        return Err(HuffmanDecodeError::InvalidPadding);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii() {
        let input = b"www.example.com";
        let encoded = encode(input);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn matches_rfc7541_example() {
        // RFC 7541 C.4.1: "www.example.com" Huffman-encodes to this exact
        // 12-byte sequence.
        let expected: [u8; 12] = [
            0xf1, 0xe3, 0xc2, 0xe5, 0xf2, 0x3a, 0x6b, 0xa0, 0xab, 0x90, 0xf4, 0xff,
        ];
        assert_eq!(encode(b"www.example.com"), expected);
        assert_eq!(decode(&expected).unwrap(), b"www.example.com");
    }

    #[test]
    fn empty_input_round_trips() {
        assert_eq!(encode(b""), Vec::<u8>::new());
        assert_eq!(decode(&[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rejects_eos_decoded_mid_stream() {
        // The EOS code is 30 bits of all 1s; padding a short stream with
        // only 1-bits up to a full EOS symbol must be rejected.
        let all_ones: [u8; 4] = [0xff, 0xff, 0xff, 0xff];
        assert_eq!(decode(&all_ones), Err(HuffmanDecodeError::EosInStream));
    }
}
