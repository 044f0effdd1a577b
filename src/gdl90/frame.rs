//! GDL90 message framing
//!
//! On the wire a message is `7E | id | payload | crc_lo | crc_hi | 7E`,
//! with any 7E/7D inside the flags sent as `7D, byte ^ 0x20`. The CRC covers
//! the message ID and payload before stuffing.

use super::crc::crc16;
use super::types::MessageId;
use crate::error::CodecError;

/// Flag byte delimiting a frame
pub const FLAG_BYTE: u8 = 0x7E;
/// Escape byte for stuffing
pub const CONTROL_ESCAPE: u8 = 0x7D;
const ESCAPE_XOR: u8 = 0x20;

/// A GDL90 message with framing and CRC stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gdl90Message {
    /// Raw message ID byte, kept so unknown IDs can still be reported
    pub id: u8,
    pub payload: Vec<u8>,
}

impl Gdl90Message {
    pub fn new(message_id: MessageId, payload: Vec<u8>) -> Self {
        Self {
            id: message_id as u8,
            payload,
        }
    }

    pub fn message_id(&self) -> MessageId {
        MessageId::from(self.id)
    }

    /// Frame this message for the wire
    pub fn to_frame(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(self.payload.len() + 3);
        body.push(self.id);
        body.extend_from_slice(&self.payload);
        let crc = crc16(&body);
        body.extend_from_slice(&crc.to_le_bytes());

        let mut frame = Vec::with_capacity(body.len() * 2 + 2);
        frame.push(FLAG_BYTE);
        for &b in &body {
            if b == FLAG_BYTE || b == CONTROL_ESCAPE {
                frame.push(CONTROL_ESCAPE);
                frame.push(b ^ ESCAPE_XOR);
            } else {
                frame.push(b);
            }
        }
        frame.push(FLAG_BYTE);
        frame
    }

    /// Parse one complete frame, flags included, and verify its CRC
    pub fn from_frame(frame: &[u8]) -> Result<Self, CodecError> {
        if frame.len() < 2 || frame[0] != FLAG_BYTE || frame[frame.len() - 1] != FLAG_BYTE {
            return Err(CodecError::Framing("missing flag byte"));
        }

        let body = unstuff(&frame[1..frame.len() - 1])?;
        if body.len() < 3 {
            return Err(CodecError::Framing("frame too short"));
        }

        let (data, trailer) = body.split_at(body.len() - 2);
        let received = u16::from_le_bytes([trailer[0], trailer[1]]);
        let computed = crc16(data);
        if computed != received {
            return Err(CodecError::Crc { computed, received });
        }

        Ok(Self {
            id: data[0],
            payload: data[1..].to_vec(),
        })
    }
}

fn unstuff(stuffed: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(stuffed.len());
    let mut bytes = stuffed.iter();

    while let Some(&b) = bytes.next() {
        match b {
            FLAG_BYTE => return Err(CodecError::Framing("flag byte inside frame")),
            CONTROL_ESCAPE => match bytes.next() {
                Some(&escaped) => out.push(escaped ^ ESCAPE_XOR),
                None => return Err(CodecError::Framing("dangling escape")),
            },
            _ => out.push(b),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_frame_icd_example() {
        let msg = Gdl90Message::new(MessageId::Heartbeat, hex::decode("8141DBD00802").unwrap());
        let frame = msg.to_frame();
        assert_eq!(hex::encode_upper(&frame), "7E008141DBD00802B38B7E");
        assert_eq!(Gdl90Message::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn test_byte_stuffing() {
        let msg = Gdl90Message::new(MessageId::UplinkData, vec![0x7E, 0x01, 0x7D]);
        let frame = msg.to_frame();
        // Neither reserved byte may appear between the flags
        assert!(!frame[1..frame.len() - 1].contains(&FLAG_BYTE));
        assert_eq!(&frame[1..6], &[0x07, 0x7D, 0x5E, 0x01, 0x7D]);
        assert_eq!(frame[6], 0x5D);
        assert_eq!(Gdl90Message::from_frame(&frame).unwrap(), msg);
    }

    #[test]
    fn test_crc_mismatch() {
        let mut frame = hex::decode("7E008141DBD00802B38B7E").unwrap();
        frame[3] ^= 0x01;
        assert!(matches!(
            Gdl90Message::from_frame(&frame),
            Err(CodecError::Crc { received: 0x8BB3, .. })
        ));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            Gdl90Message::from_frame(&[0x7E]),
            Err(CodecError::Framing(_))
        ));
        assert!(matches!(
            Gdl90Message::from_frame(&[0x00, 0x01, 0x02, 0x7E]),
            Err(CodecError::Framing("missing flag byte"))
        ));
        assert!(matches!(
            Gdl90Message::from_frame(&[0x7E, 0x00, 0x7D, 0x7E]),
            Err(CodecError::Framing("dangling escape"))
        ));
        assert!(matches!(
            Gdl90Message::from_frame(&[0x7E, 0x00, 0x7E]),
            Err(CodecError::Framing("frame too short"))
        ));
    }

    #[test]
    fn test_unknown_id_preserved() {
        let msg = Gdl90Message {
            id: 0x65,
            payload: vec![1, 2, 3],
        };
        let parsed = Gdl90Message::from_frame(&msg.to_frame()).unwrap();
        assert_eq!(parsed.id, 0x65);
        assert_eq!(parsed.message_id(), MessageId::Unknown);
    }
}
