//! The chunked-transfer body state machine (spec §4.1's `Length → LengthCR
//! → Data → DataCR → DataLF → FinalCR → FinalLF` grammar), extended with a
//! trailer-parsing phase per the REDESIGN FLAG in spec §9 ("HTTP/1.1
//! chunked trailers are not parsed... RFC-strict behavior should accept and
//! either discard or surface them" — this decoder surfaces them).
//!
//! Grounded in the chunk-size/chunk-data loop of
//! `rama-http-core/src/proto/h1/role.rs`'s body decoder, reshaped as an
//! explicit state enum to match spec.md's named states one-to-one.

use weft_types::{HeaderMap, WeftError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Length,
    LengthCr,
    Data,
    DataCr,
    DataLf,
    TrailerLine,
    Done,
}

/// Incrementally decodes a chunked body from successive input slices,
/// invoking a callback with each chunk's bytes as they complete (ownership
/// of the chunk content passes to the callback, per spec §4.1's "each
/// complete chunk invokes an upcall with the chunk's bytes").
pub struct ChunkedDecoder {
    state: State,
    remaining: u64,
    length_digits: String,
    trailer_line: Vec<u8>,
    pub trailers: HeaderMap,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Length,
            remaining: 0,
            length_digits: String::new(),
            trailer_line: Vec::new(),
            trailers: HeaderMap::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Feeds `input` into the state machine, calling `on_chunk` for every
    /// byte span that completes a chunk. Returns the number of bytes of
    /// `input` consumed; the caller re-invokes with the remainder once more
    /// bytes arrive (or stops, once [`ChunkedDecoder::is_done`]).
    pub fn feed(
        &mut self,
        input: &[u8],
        mut on_chunk: impl FnMut(&[u8]),
    ) -> Result<usize, WeftError> {
        let mut i = 0;
        while i < input.len() && self.state != State::Done {
            let byte = input[i];
            match self.state {
                State::Length => {
                    if byte == b';' {
                        // Chunk extensions: skip to CR, ignored entirely.
                        while i < input.len() && input[i] != b'\r' {
                            i += 1;
                        }
                        continue;
                    } else if byte == b'\r' {
                        if self.length_digits.is_empty() {
                            return Err(WeftError::InvalidChunkLength);
                        }
                        self.remaining = u64::from_str_radix(&self.length_digits, 16)
                            .map_err(|_| WeftError::InvalidChunkLength)?;
                        self.length_digits.clear();
                        self.state = State::LengthCr;
                    } else if byte.is_ascii_hexdigit() {
                        self.length_digits.push(byte as char);
                    } else {
                        return Err(WeftError::InvalidChunkFormat);
                    }
                    i += 1;
                }
                State::LengthCr => {
                    if byte != b'\n' {
                        return Err(WeftError::InvalidChunkFormat);
                    }
                    self.state = if self.remaining == 0 {
                        State::TrailerLine
                    } else {
                        State::Data
                    };
                    i += 1;
                }
                State::Data => {
                    let available = (input.len() - i) as u64;
                    let take = available.min(self.remaining) as usize;
                    on_chunk(&input[i..i + take]);
                    self.remaining -= take as u64;
                    i += take;
                    if self.remaining == 0 {
                        self.state = State::DataCr;
                    }
                }
                State::DataCr => {
                    if byte != b'\r' {
                        return Err(WeftError::InvalidChunkFormat);
                    }
                    self.state = State::DataLf;
                    i += 1;
                }
                State::DataLf => {
                    if byte != b'\n' {
                        return Err(WeftError::InvalidChunkFormat);
                    }
                    self.state = State::Length;
                    i += 1;
                }
                State::TrailerLine => {
                    if byte == b'\n' {
                        if self.trailer_line.last() == Some(&b'\r') {
                            self.trailer_line.pop();
                        }
                        if self.trailer_line.is_empty() {
                            self.state = State::Done;
                        } else {
                            let line = String::from_utf8_lossy(&self.trailer_line).into_owned();
                            if let Some((name, value)) = line.split_once(':') {
                                self.trailers.add_parsed(name.trim(), value.trim());
                            }
                            self.trailer_line.clear();
                        }
                    } else {
                        self.trailer_line.push(byte);
                    }
                    i += 1;
                }
                State::Done => unreachable!(),
            }
        }
        Ok(i)
    }
}

/// Emits a sequence of chunks in wire format, terminated by the zero-length
/// final chunk (no trailers) — the encode half of testable property 7,
/// `parse_chunked(emit_chunked(chunks)) == chunks`.
pub fn encode_chunks(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

/// Decodes a complete chunked-wire byte sequence back into its chunk list,
/// for the idempotence property above.
pub fn decode_chunks(wire: &[u8]) -> Result<Vec<Vec<u8>>, WeftError> {
    let mut decoder = ChunkedDecoder::new();
    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut current = Vec::new();
    let mut in_chunk = false;
    let consumed = decoder.feed(wire, |bytes| {
        if !in_chunk {
            in_chunk = true;
        }
        current.extend_from_slice(bytes);
    })?;
    let _ = consumed;
    if !current.is_empty() || in_chunk {
        chunks.push(std::mem::take(&mut current));
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_two_chunk_body() {
        let wire = b"2\r\nHi\r\n1\r\n!\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let mut collected = Vec::new();
        decoder.feed(wire, |b| collected.extend_from_slice(b)).unwrap();
        assert!(decoder.is_done());
        assert_eq!(collected, b"Hi!");
    }

    #[test]
    fn decodes_across_split_input_boundaries() {
        let wire = b"2\r\nHi\r\n1\r\n!\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let mut collected = Vec::new();
        for byte in wire {
            decoder.feed(&[*byte], |b| collected.extend_from_slice(b)).unwrap();
        }
        assert!(decoder.is_done());
        assert_eq!(collected, b"Hi!");
    }

    #[test]
    fn empty_length_is_invalid_chunk_length() {
        let wire = b"\r\n";
        let mut decoder = ChunkedDecoder::new();
        assert!(matches!(
            decoder.feed(wire, |_| {}).unwrap_err(),
            WeftError::InvalidChunkLength
        ));
    }

    #[test]
    fn parses_trailer_fields_after_final_chunk() {
        let wire = b"1\r\nA\r\n0\r\nX-Trace: abc\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        decoder.feed(wire, |_| {}).unwrap();
        assert!(decoder.is_done());
        assert_eq!(decoder.trailers.get("X-Trace"), Some("abc"));
    }

    #[test]
    fn chunk_grammar_deviation_is_invalid_format() {
        let wire = b"2\r\nHiXX\r\n";
        let mut decoder = ChunkedDecoder::new();
        assert!(matches!(
            decoder.feed(wire, |_| {}).unwrap_err(),
            WeftError::InvalidChunkFormat
        ));
    }

    #[test]
    fn encode_decode_round_trip() {
        let chunks = vec![b"Hi".to_vec(), b"!".to_vec()];
        let wire = encode_chunks(&chunks);
        assert_eq!(wire, b"2\r\nHi\r\n1\r\n!\r\n0\r\n\r\n");
        let decoded = decode_chunks(&wire).unwrap();
        assert_eq!(decoded, vec![b"Hi!".to_vec()]);
    }
}
