use super::{Head, Kind};
use crate::error::Error;

pub const ACK: u8 = 0x1;

/// PING: stream_id 0, exactly 8 opaque octets. A non-ACK ping must be
/// echoed back with ACK set and the same payload.
#[derive(Debug, Clone, Copy)]
pub struct Ping {
    pub ack: bool,
    pub payload: [u8; 8],
}

impl Ping {
    pub fn load(head: Head, payload: &[u8]) -> Result<Self, Error> {
        if head.stream_id != 0 {
            return Err(Error::InvalidStreamId);
        }
        if payload.len() != 8 {
            return Err(Error::BadFrameSize);
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(payload);
        Ok(Ping {
            ack: head.flags & ACK != 0,
            payload: buf,
        })
    }

    pub fn pong(self) -> Ping {
        Ping {
            ack: true,
            payload: self.payload,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let head = Head {
            kind: Kind::Ping,
            flags: if self.ack { ACK } else { 0 },
            stream_id: 0,
            length: 8,
        };
        head.encode(8, out);
        out.extend_from_slice(&self.payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pong_echoes_payload_with_ack_set() {
        let ping = Ping {
            ack: false,
            payload: *b"12345678",
        };
        let pong = ping.pong();
        assert!(pong.ack);
        assert_eq!(pong.payload, ping.payload);
    }

    #[test]
    fn rejects_nonzero_stream_id() {
        let head = Head {
            kind: Kind::Ping,
            flags: 0,
            stream_id: 1,
            length: 8,
        };
        assert!(matches!(Ping::load(head, &[0; 8]), Err(Error::InvalidStreamId)));
    }
}
