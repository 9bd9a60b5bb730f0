//! RFC 7541 §5.1 prefix-N integer encoding and §5.2 string-literal
//! encoding, shared by the decoder and encoder.

use crate::huffman;

/// Encodes `value` using an N-bit prefix, ORing the low bits into
/// `first_byte_high_bits` (the flag bits the caller has already set in the
/// first byte, e.g. the `1` indexed bit or `01` literal-with-incremental
/// bits).
///
/// Boundary case (RFC 7541 §5.1 example): a prefix-5 field encoding the
/// value 31 emits the prefix saturated to all-1s (`11111`) followed by a
/// continuation byte of `0` — i.e. `value - (2^N - 1) = 0` still gets an
/// explicit (if trivial) continuation byte.
pub(crate) fn encode_int(out: &mut Vec<u8>, first_byte_high_bits: u8, prefix_bits: u32, value: usize) {
    let max_prefix = (1usize << prefix_bits) - 1;
    if value < max_prefix {
        out.push(first_byte_high_bits | value as u8);
        return;
    }
    out.push(first_byte_high_bits | max_prefix as u8);
    let mut remaining = value - max_prefix;
    while remaining >= 128 {
        out.push(((remaining % 128) | 0x80) as u8);
        remaining /= 128;
    }
    out.push(remaining as u8);
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntegerDecodeError {
    #[error("integer continuation ran past the end of the header block")]
    Truncated,
    #[error("integer encoding overflowed the representable range")]
    Overflow,
}

/// Decodes a prefix-N integer starting at `input[0]` (whose low
/// `prefix_bits` bits carry the prefix value); returns `(value,
/// bytes_consumed)`.
pub(crate) fn decode_int(
    input: &[u8],
    prefix_bits: u32,
) -> Result<(usize, usize), IntegerDecodeError> {
    let max_prefix = (1usize << prefix_bits) - 1;
    let first = *input.first().ok_or(IntegerDecodeError::Truncated)? as usize;
    let prefix_value = first & max_prefix;
    if prefix_value < max_prefix {
        return Ok((prefix_value, 1));
    }

    let mut value = max_prefix;
    let mut m = 0u32;
    let mut consumed = 1;
    loop {
        let byte = *input.get(consumed).ok_or(IntegerDecodeError::Truncated)?;
        consumed += 1;
        let addend = ((byte & 0x7f) as usize)
            .checked_shl(m)
            .ok_or(IntegerDecodeError::Overflow)?;
        value = value.checked_add(addend).ok_or(IntegerDecodeError::Overflow)?;
        if byte & 0x80 == 0 {
            break;
        }
        m += 7;
        if m >= 64 {
            return Err(IntegerDecodeError::Overflow);
        }
    }
    Ok((value, consumed))
}

/// Encodes a string literal: a 1-bit Huffman flag plus prefix-7 length,
/// choosing whichever representation (raw or Huffman) is shorter, as RFC
/// 7541 leaves the choice to the encoder.
pub(crate) fn encode_string(out: &mut Vec<u8>, value: &str) {
    let raw = value.as_bytes();
    let huff_len = huffman::encoded_len(raw);
    if huff_len < raw.len() {
        encode_int(out, 0x80, 7, huff_len);
        out.extend_from_slice(&huffman::encode(raw));
    } else {
        encode_int(out, 0x00, 7, raw.len());
        out.extend_from_slice(raw);
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StringDecodeError {
    #[error(transparent)]
    Integer(#[from] IntegerDecodeError),
    #[error("string literal ran past the end of the header block")]
    Truncated,
    #[error(transparent)]
    Huffman(#[from] crate::huffman::HuffmanDecodeError),
    #[error("string literal is not valid UTF-8")]
    InvalidUtf8,
}

/// Decodes a string literal starting at `input[0]`; returns `(value,
/// bytes_consumed)`.
pub(crate) fn decode_string(input: &[u8]) -> Result<(String, usize), StringDecodeError> {
    let first = *input.first().ok_or(StringDecodeError::Truncated)?;
    let huffman_coded = first & 0x80 != 0;
    let (len, len_consumed) = decode_int(input, 7)?;
    let start = len_consumed;
    let end = start.checked_add(len).ok_or(StringDecodeError::Truncated)?;
    let raw = input.get(start..end).ok_or(StringDecodeError::Truncated)?;

    let bytes = if huffman_coded {
        huffman::decode(raw)?
    } else {
        raw.to_vec()
    };
    let s = String::from_utf8(bytes).map_err(|_| StringDecodeError::InvalidUtf8)?;
    Ok((s, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_boundary_prefix_5_value_31() {
        // RFC 7541 §5.1 worked example: value 31 in a 5-bit prefix emits the
        // prefix saturated (11111) plus a continuation byte of 0.
        let mut out = Vec::new();
        encode_int(&mut out, 0, 5, 31);
        assert_eq!(out, vec![0b0001_1111, 0x00]);
        let (value, consumed) = decode_int(&out, 5).unwrap();
        assert_eq!(value, 31);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn integer_below_prefix_max_fits_in_one_byte() {
        let mut out = Vec::new();
        encode_int(&mut out, 0, 5, 10);
        assert_eq!(out, vec![10]);
        assert_eq!(decode_int(&out, 5).unwrap(), (10, 1));
    }

    #[test]
    fn integer_large_value_rfc_example() {
        // RFC 7541 C.1.3: 1337 encoded with a 5-bit prefix.
        let mut out = Vec::new();
        encode_int(&mut out, 0, 5, 1337);
        assert_eq!(out, vec![31, 154, 10]);
        assert_eq!(decode_int(&out, 5).unwrap(), (1337, 3));
    }

    #[test]
    fn string_round_trip_with_huffman_choice() {
        let mut out = Vec::new();
        encode_string(&mut out, "www.example.com");
        let (decoded, consumed) = decode_string(&out).unwrap();
        assert_eq!(decoded, "www.example.com");
        assert_eq!(consumed, out.len());
    }
}
