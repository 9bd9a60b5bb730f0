use super::{Head, Kind};
use crate::error::Error;

/// WINDOW_UPDATE: exactly 4 octets, a 31-bit increment. `stream_id == 0`
/// targets the connection window; otherwise the named stream.
/// `increment == 0` is always a protocol violation.
#[derive(Debug, Clone, Copy)]
pub struct WindowUpdate {
    pub stream_id: u32,
    pub increment: u32,
}

impl WindowUpdate {
    pub fn load(head: Head, payload: &[u8]) -> Result<Self, Error> {
        if payload.len() != 4 {
            return Err(Error::BadFrameSize);
        }
        let increment =
            u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7fff_ffff;
        if increment == 0 {
            return Err(Error::InvalidWindowUpdateValue);
        }
        Ok(WindowUpdate {
            stream_id: head.stream_id,
            increment,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        let head = Head {
            kind: Kind::WindowUpdate,
            flags: 0,
            stream_id: self.stream_id,
            length: 4,
        };
        head.encode(4, out);
        out.extend_from_slice(&(self.increment & 0x7fff_ffff).to_be_bytes());
    }
}
