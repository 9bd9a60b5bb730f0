use super::{Head, Kind};
use crate::error::Error;
use bytes::Bytes;
use weft_types::Reason;

/// GOAWAY: stream_id 0, `{last_stream_id:31, error:32, debug_data...}`.
#[derive(Debug, Clone)]
pub struct GoAway {
    pub last_stream_id: u32,
    pub reason: Reason,
    pub debug_data: Bytes,
}

impl GoAway {
    pub fn load(head: Head, payload: &[u8]) -> Result<Self, Error> {
        if head.stream_id != 0 {
            return Err(Error::InvalidStreamId);
        }
        if payload.len() < 8 {
            return Err(Error::BadFrameSize);
        }
        let last_stream_id =
            u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7fff_ffff;
        let code = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
        Ok(GoAway {
            last_stream_id,
            reason: Reason::from_wire(code),
            debug_data: Bytes::copy_from_slice(&payload[8..]),
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let length = 8 + self.debug_data.len() as u32;
        let head = Head {
            kind: Kind::GoAway,
            flags: 0,
            stream_id: 0,
            length,
        };
        head.encode(length, out);
        out.extend_from_slice(&(self.last_stream_id & 0x7fff_ffff).to_be_bytes());
        out.extend_from_slice(&self.reason.into_wire().to_be_bytes());
        out.extend_from_slice(&self.debug_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_parse_round_trip() {
        let frame = GoAway {
            last_stream_id: 7,
            reason: Reason::NoError,
            debug_data: Bytes::from_static(b"bye"),
        };
        let mut out = Vec::new();
        frame.encode(&mut out);
        let head = Head::parse(&out[..super::FRAME_HEADER_LEN]).unwrap();
        let parsed = GoAway::load(head, &out[super::FRAME_HEADER_LEN..]).unwrap();
        assert_eq!(parsed.last_stream_id, 7);
        assert_eq!(parsed.debug_data, Bytes::from_static(b"bye"));
    }
}
