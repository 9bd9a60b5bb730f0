use super::{Head, Kind};
use crate::error::Error;
use weft_types::Reason;

/// RST_STREAM: exactly 4 octets, an error code. Immediately moves the
/// stream to Closed; further non-PRIORITY frames on it are ignored.
#[derive(Debug, Clone, Copy)]
pub struct RstStream {
    pub stream_id: u32,
    pub reason: Reason,
}

impl RstStream {
    pub fn load(head: Head, payload: &[u8]) -> Result<Self, Error> {
        if head.stream_id == 0 {
            return Err(Error::InvalidStreamId);
        }
        if payload.len() != 4 {
            return Err(Error::BadFrameSize);
        }
        let code = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        Ok(RstStream {
            stream_id: head.stream_id,
            reason: Reason::from_wire(code),
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let head = Head {
            kind: Kind::RstStream,
            flags: 0,
            stream_id: self.stream_id,
            length: 4,
        };
        head.encode(4, out);
        out.extend_from_slice(&self.reason.into_wire().to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_length_is_rejected() {
        let head = Head {
            kind: Kind::RstStream,
            flags: 0,
            stream_id: 1,
            length: 3,
        };
        assert!(matches!(RstStream::load(head, &[0; 3]), Err(Error::BadFrameSize)));
    }

    #[test]
    fn round_trips_reason() {
        let frame = RstStream {
            stream_id: 5,
            reason: Reason::Cancel,
        };
        let mut out = Vec::new();
        frame.encode(&mut out);
        let head = Head::parse(&out[..super::FRAME_HEADER_LEN]).unwrap();
        let parsed = RstStream::load(head, &out[super::FRAME_HEADER_LEN..]).unwrap();
        assert_eq!(parsed.reason, Reason::Cancel);
    }
}
