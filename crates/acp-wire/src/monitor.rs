//! Unsolicited monitor frames.
//!
//! Once a MONITOR exchange is acknowledged the server pushes frames of its
//! own framing: `"XE"` magic, two reserved bytes, a 4-byte big-endian body
//! size, then a plist body.

use acp_core::error::{FramingError, PayloadError};
use bytes::BufMut;

use crate::cflbinary::{self, Value};

/// Frame magic.
pub const FRAME_MAGIC: [u8; 2] = *b"XE";
/// Fixed frame header size.
pub const FRAME_HEADER_LEN: usize = 8;

/// Parsed monitor frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub body_size: u32,
}

impl FrameHeader {
    /// Decode the fixed 8-byte frame header.
    pub fn parse(bytes: &[u8]) -> Result<Self, FramingError> {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(FramingError::Truncated {
                needed: FRAME_HEADER_LEN,
                have: bytes.len(),
            });
        }
        if bytes[..2] != FRAME_MAGIC {
            return Err(FramingError::BadMagic);
        }
        // Bytes 2..4 are reserved and ignored.
        let body_size = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(Self { body_size })
    }
}

/// Encode a monitor event frame.
pub fn compose_frame(event: &Value) -> Result<Vec<u8>, PayloadError> {
    let body = cflbinary::compose(event)?;
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    out.put_slice(&FRAME_MAGIC);
    out.put_bytes(0, 2);
    out.put_u32(body.len() as u32);
    out.put_slice(&body);
    Ok(out)
}

/// Build the MONITOR request body: 4 zero bytes then `{filters: ...}`.
pub fn compose_request(filters: &Value) -> Result<Vec<u8>, PayloadError> {
    let payload = Value::dict([("filters", filters.clone())]);
    let mut out = vec![0u8; 4];
    out.extend_from_slice(&cflbinary::compose(&payload)?);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip() {
        let event = Value::dict([("name", Value::from("dbug"))]);
        let frame = compose_frame(&event).unwrap();

        let header = FrameHeader::parse(&frame).unwrap();
        assert_eq!(header.body_size as usize, frame.len() - FRAME_HEADER_LEN);

        let body = &frame[FRAME_HEADER_LEN..];
        assert_eq!(cflbinary::parse(body).unwrap(), event);
    }

    #[test]
    fn header_layout() {
        let frame = compose_frame(&Value::Null).unwrap();
        assert_eq!(&frame[..2], b"XE");
        assert_eq!(&frame[2..4], &[0, 0]);
        assert_eq!(u32::from_be_bytes(frame[4..8].try_into().unwrap()), 9);
    }

    #[test]
    fn reserved_bytes_are_ignored_by_parser() {
        let mut frame = compose_frame(&Value::Null).unwrap();
        frame[2] = 0xaa;
        frame[3] = 0x55;
        assert!(FrameHeader::parse(&frame).is_ok());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut frame = compose_frame(&Value::Null).unwrap();
        frame[0] = b'x';
        assert!(matches!(
            FrameHeader::parse(&frame),
            Err(FramingError::BadMagic)
        ));
    }

    #[test]
    fn request_body_starts_with_four_zeros() {
        let filters = Value::dict([("properties", Value::Array(vec!["dbug".into()]))]);
        let body = compose_request(&filters).unwrap();
        assert_eq!(&body[..4], &[0, 0, 0, 0]);
        let parsed = cflbinary::parse(&body[4..]).unwrap();
        assert!(parsed.get("filters").is_some());
    }

    #[test]
    fn truncated_header_is_rejected() {
        assert!(matches!(
            FrameHeader::parse(b"XE\0\0"),
            Err(FramingError::Truncated { .. })
        ));
    }
}
