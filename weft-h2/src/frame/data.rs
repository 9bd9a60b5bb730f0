use super::{strip_padding, Head, Kind, FRAME_HEADER_LEN};
use crate::error::Error;
use bytes::Bytes;

pub const END_STREAM: u8 = 0x1;
pub const PADDED: u8 = 0x8;

#[derive(Debug, Clone)]
pub struct Data {
    pub stream_id: u32,
    pub data: Bytes,
    pub end_stream: bool,
    pub pad_len: usize,
}

impl Data {
    pub fn load(head: Head, payload: &[u8]) -> Result<Self, Error> {
        if head.stream_id == 0 {
            return Err(Error::InvalidStreamId);
        }
        let (content, pad_len) = strip_padding(payload, head.flags & PADDED != 0)?;
        Ok(Data {
            stream_id: head.stream_id,
            data: Bytes::copy_from_slice(content),
            end_stream: head.flags & END_STREAM != 0,
            pad_len,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut flags = 0u8;
        if self.end_stream {
            flags |= END_STREAM;
        }
        let head = Head {
            kind: Kind::Data,
            flags,
            stream_id: self.stream_id,
            length: self.data.len() as u32,
        };
        head.encode(self.data.len() as u32, out);
        out.extend_from_slice(&self.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_data_on_stream_zero() {
        let head = Head {
            kind: Kind::Data,
            flags: 0,
            stream_id: 0,
            length: 0,
        };
        assert!(matches!(Data::load(head, &[]), Err(Error::InvalidStreamId)));
    }

    #[test]
    fn padding_larger_than_payload_is_rejected() {
        let head = Head {
            kind: Kind::Data,
            flags: PADDED,
            stream_id: 1,
            length: 2,
        };
        // pad_len byte says 5, but only 1 byte follows.
        let payload = [5u8, b'x'];
        assert!(matches!(Data::load(head, &payload), Err(Error::TooMuchPadding)));
    }

    #[test]
    fn encode_parse_round_trip() {
        let frame = Data {
            stream_id: 3,
            data: Bytes::from_static(b"hello"),
            end_stream: true,
            pad_len: 0,
        };
        let mut out = Vec::new();
        frame.encode(&mut out);
        let head = Head::parse(&out[..FRAME_HEADER_LEN]).unwrap();
        let parsed = Data::load(head, &out[FRAME_HEADER_LEN..]).unwrap();
        assert_eq!(parsed.data, frame.data);
        assert!(parsed.end_stream);
    }
}
