use super::{strip_padding, Head, Kind, FRAME_HEADER_LEN};
use crate::error::Error;
use bytes::Bytes;

pub const END_STREAM: u8 = 0x1;
pub const END_HEADERS: u8 = 0x4;
pub const PADDED: u8 = 0x8;
pub const PRIORITY: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDependency {
    pub dependency_id: u32,
    pub weight: u8,
    pub is_exclusive: bool,
}

impl StreamDependency {
    pub const DEFAULT_WEIGHT: u8 = 15; // wire value; actual weight = value + 1 = 16

    fn load(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < 5 {
            return Err(Error::BadFrameSize);
        }
        let raw = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        Ok(StreamDependency {
            dependency_id: raw & 0x7fff_ffff,
            weight: buf[4],
            is_exclusive: raw & 0x8000_0000 != 0,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        let mut raw = self.dependency_id & 0x7fff_ffff;
        if self.is_exclusive {
            raw |= 0x8000_0000;
        }
        out.extend_from_slice(&raw.to_be_bytes());
        out.push(self.weight);
    }
}

/// The HEADERS frame, carrying a (possibly partial) HPACK-encoded header
/// block fragment. A header block is only decodable once every
/// CONTINUATION in the sequence (terminated by END_HEADERS) has arrived —
/// reassembly lives in the stream layer, not here.
#[derive(Debug, Clone)]
pub struct Headers {
    pub stream_id: u32,
    pub header_block_fragment: Bytes,
    pub end_stream: bool,
    pub end_headers: bool,
    pub priority: Option<StreamDependency>,
    pub pad_len: usize,
}

impl Headers {
    pub fn load(head: Head, payload: &[u8]) -> Result<Self, Error> {
        if head.stream_id == 0 {
            return Err(Error::InvalidStreamId);
        }
        let (content, pad_len) = strip_padding(payload, head.flags & PADDED != 0)?;
        let (priority, rest) = if head.flags & PRIORITY != 0 {
            let dep = StreamDependency::load(content)?;
            if dep.dependency_id == head.stream_id {
                return Err(Error::InvalidDependencyId);
            }
            (Some(dep), &content[5..])
        } else {
            (None, content)
        };
        Ok(Headers {
            stream_id: head.stream_id,
            header_block_fragment: Bytes::copy_from_slice(rest),
            end_stream: head.flags & END_STREAM != 0,
            end_headers: head.flags & END_HEADERS != 0,
            priority,
            pad_len,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut flags = 0u8;
        if self.end_stream {
            flags |= END_STREAM;
        }
        if self.end_headers {
            flags |= END_HEADERS;
        }
        if self.priority.is_some() {
            flags |= PRIORITY;
        }
        let mut payload = Vec::new();
        if let Some(dep) = &self.priority {
            dep.encode(&mut payload);
        }
        payload.extend_from_slice(&self.header_block_fragment);

        let head = Head {
            kind: Kind::Headers,
            flags,
            stream_id: self.stream_id,
            length: payload.len() as u32,
        };
        head.encode(payload.len() as u32, out);
        out.extend_from_slice(&payload);
    }
}

/// A CONTINUATION frame: more header block fragment for the stream named by
/// the preceding HEADERS/PUSH_PROMISE. `END_HEADERS` terminates the
/// sequence.
#[derive(Debug, Clone)]
pub struct Continuation {
    pub stream_id: u32,
    pub header_block_fragment: Bytes,
    pub end_headers: bool,
}

impl Continuation {
    pub fn load(head: Head, payload: &[u8]) -> Result<Self, Error> {
        if head.stream_id == 0 {
            return Err(Error::InvalidStreamId);
        }
        Ok(Continuation {
            stream_id: head.stream_id,
            header_block_fragment: Bytes::copy_from_slice(payload),
            end_headers: head.flags & END_HEADERS != 0,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let flags = if self.end_headers { END_HEADERS } else { 0 };
        let head = Head {
            kind: Kind::Continuation,
            flags,
            stream_id: self.stream_id,
            length: self.header_block_fragment.len() as u32,
        };
        head.encode(self.header_block_fragment.len() as u32, out);
        out.extend_from_slice(&self.header_block_fragment);
    }
}
