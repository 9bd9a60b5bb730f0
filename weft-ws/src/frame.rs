//! Frame parsing and emission (RFC 6455 §5), grounded verbatim in
//! `galay-http/protoc/websocket/WebSocketFrame.cc`'s `WsFrameParser`.
//!
//! `from_iovec` walks a slice of `IoSlice` (Rust's scatter-gather read
//! buffer type) the same way the original walks a `std::vector<iovec>`: a
//! byte-at-a-time cursor that never copies the whole input into one
//! contiguous buffer, only the final (already-length-checked) payload.

use crate::error::WsError;
use crate::opcode::Opcode;
use crate::utf8::is_valid_utf8;
use std::io::IoSlice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: Opcode,
    pub mask: bool,
    pub masking_key: [u8; 4],
    pub payload_length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: Opcode, payload: Vec<u8>, fin: bool) -> Self {
        Self {
            header: FrameHeader {
                fin,
                rsv1: false,
                rsv2: false,
                rsv3: false,
                opcode,
                mask: false,
                masking_key: [0; 4],
                payload_length: payload.len() as u64,
            },
            payload,
        }
    }

    /// Builds a Close frame: the first 2 payload bytes are the big-endian
    /// status code, the remainder is the UTF-8 reason text.
    pub fn close(code: weft_types::CloseCode, reason: &str) -> Self {
        let mut payload = Vec::with_capacity(2 + reason.len());
        let code = code as u16;
        payload.push((code >> 8) as u8);
        payload.push((code & 0xff) as u8);
        payload.extend_from_slice(reason.as_bytes());
        Self::new(Opcode::Close, payload, true)
    }
}

fn total_len(iovecs: &[IoSlice<'_>]) -> usize {
    iovecs.iter().map(|s| s.len()).sum()
}

fn read_byte(iovecs: &[IoSlice<'_>], offset: usize) -> Option<u8> {
    let mut remaining = offset;
    for slice in iovecs {
        if remaining < slice.len() {
            return Some(slice[remaining]);
        }
        remaining -= slice.len();
    }
    None
}

fn read_bytes(iovecs: &[IoSlice<'_>], offset: usize, len: usize, out: &mut Vec<u8>) -> bool {
    out.reserve(len);
    for i in 0..len {
        match read_byte(iovecs, offset + i) {
            Some(b) => out.push(b),
            None => return false,
        }
    }
    true
}

fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Parses one frame starting at the beginning of `iovecs`. Returns the
/// number of bytes consumed on success.
pub fn from_iovec(iovecs: &[IoSlice<'_>], is_server: bool) -> Result<(Frame, usize), WsError> {
    let total = total_len(iovecs);
    if total < 2 {
        return Err(WsError::Incomplete);
    }

    let mut offset = 0usize;
    let byte1 = read_byte(iovecs, offset).ok_or(WsError::Incomplete)?;
    offset += 1;

    let fin = byte1 & 0x80 != 0;
    let rsv1 = byte1 & 0x40 != 0;
    let rsv2 = byte1 & 0x20 != 0;
    let rsv3 = byte1 & 0x10 != 0;
    if rsv1 || rsv2 || rsv3 {
        return Err(WsError::ReservedBitsSet);
    }

    let opcode = Opcode::parse(byte1 & 0x0f)?;
    if opcode.is_control() && !fin {
        return Err(WsError::ControlFrameFragmented);
    }

    let byte2 = read_byte(iovecs, offset).ok_or(WsError::Incomplete)?;
    offset += 1;

    let mask = byte2 & 0x80 != 0;
    if is_server && !mask {
        return Err(WsError::MaskRequired);
    }
    if !is_server && mask {
        return Err(WsError::MaskNotAllowed);
    }

    let len_field = byte2 & 0x7f;
    let payload_length: u64 = if len_field < 126 {
        len_field as u64
    } else if len_field == 126 {
        if total < offset + 2 {
            return Err(WsError::Incomplete);
        }
        let hi = read_byte(iovecs, offset).ok_or(WsError::Incomplete)?;
        let lo = read_byte(iovecs, offset + 1).ok_or(WsError::Incomplete)?;
        offset += 2;
        u16::from_be_bytes([hi, lo]) as u64
    } else {
        if total < offset + 8 {
            return Err(WsError::Incomplete);
        }
        let mut bytes = [0u8; 8];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = read_byte(iovecs, offset + i).ok_or(WsError::Incomplete)?;
        }
        offset += 8;
        u64::from_be_bytes(bytes)
    };

    if opcode.is_control() && payload_length > 125 {
        return Err(WsError::ControlFrameTooLarge);
    }

    let mut masking_key = [0u8; 4];
    if mask {
        if total < offset + 4 {
            return Err(WsError::Incomplete);
        }
        for (i, b) in masking_key.iter_mut().enumerate() {
            *b = read_byte(iovecs, offset + i).ok_or(WsError::Incomplete)?;
        }
        offset += 4;
    }

    let payload_len_usize: usize = payload_length
        .try_into()
        .map_err(|_| WsError::InvalidPayloadLength)?;
    if total < offset + payload_len_usize {
        return Err(WsError::Incomplete);
    }

    let mut payload = Vec::new();
    if !read_bytes(iovecs, offset, payload_len_usize, &mut payload) {
        return Err(WsError::InvalidFrame);
    }
    offset += payload_len_usize;

    if mask {
        apply_mask(&mut payload, masking_key);
    }

    if opcode == Opcode::Text && fin && !is_valid_utf8(&payload) {
        return Err(WsError::InvalidUtf8);
    }

    let header = FrameHeader {
        fin,
        rsv1,
        rsv2,
        rsv3,
        opcode,
        mask,
        masking_key,
        payload_length,
    };
    Ok((Frame { header, payload }, offset))
}

/// Emits `frame` to wire bytes, masking with a fresh random key when
/// `use_mask` is set (clients always mask; servers never do).
pub fn to_bytes(frame: &Frame, use_mask: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.payload.len() + 14);

    let mut byte1 = 0u8;
    if frame.header.fin {
        byte1 |= 0x80;
    }
    if frame.header.rsv1 {
        byte1 |= 0x40;
    }
    if frame.header.rsv2 {
        byte1 |= 0x20;
    }
    if frame.header.rsv3 {
        byte1 |= 0x10;
    }
    byte1 |= frame.header.opcode.as_u8() & 0x0f;
    out.push(byte1);

    let payload_len = frame.payload.len() as u64;
    let mut byte2 = if use_mask { 0x80 } else { 0x00 };
    if payload_len < 126 {
        byte2 |= payload_len as u8;
        out.push(byte2);
    } else if payload_len <= 0xffff {
        byte2 |= 126;
        out.push(byte2);
        out.extend_from_slice(&(payload_len as u16).to_be_bytes());
    } else {
        byte2 |= 127;
        out.push(byte2);
        out.extend_from_slice(&payload_len.to_be_bytes());
    }

    let mut payload = frame.payload.clone();
    if use_mask {
        let key: [u8; 4] = rand::random();
        out.extend_from_slice(&key);
        apply_mask(&mut payload, key);
    }
    out.extend_from_slice(&payload);
    out
}
