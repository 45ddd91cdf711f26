//! Property element codec: 12-byte header plus raw value bytes.
//!
//! Property lists on the wire are a run of elements closed by a 16-byte
//! all-zero sentinel.

use acp_core::error::FramingError;
use bytes::{Buf, BufMut};

/// Element header size.
pub const ELEMENT_HEADER_LEN: usize = 12;
/// End-of-list marker.
pub const SENTINEL: [u8; 16] = [0u8; 16];
/// Flag bit 0: the value carries a 32-bit signed error code, not data.
pub const FLAG_ERROR: u32 = 1;

/// Parsed element header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    pub name: [u8; 4],
    pub flags: u32,
    pub size: u32,
}

impl ElementHeader {
    /// Decode a 12-byte header.
    pub fn parse(bytes: &[u8]) -> Result<Self, FramingError> {
        if bytes.len() < ELEMENT_HEADER_LEN {
            return Err(FramingError::Truncated {
                needed: ELEMENT_HEADER_LEN,
                have: bytes.len(),
            });
        }
        let mut buf = bytes;
        let mut name = [0u8; 4];
        buf.copy_to_slice(&mut name);
        Ok(Self {
            name,
            flags: buf.get_u32(),
            size: buf.get_u32(),
        })
    }

    /// A zero name/flags/size header starts the 16-byte sentinel; the
    /// remaining 4 zero bytes follow on the wire.
    pub fn is_sentinel(&self) -> bool {
        self.name == [0u8; 4] && self.flags == 0 && self.size == 0
    }

    /// Error elements carry a 4-byte signed code in place of data.
    pub fn is_error(&self) -> bool {
        self.flags & FLAG_ERROR != 0
    }
}

/// Encode one element: header followed by the value bytes.
pub fn compose(flags: u32, name: [u8; 4], value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ELEMENT_HEADER_LEN + value.len());
    out.put_slice(&name);
    out.put_u32(flags);
    out.put_u32(value.len() as u32);
    out.put_slice(value);
    out
}

/// Encode an error element for `name` carrying `code`.
pub fn compose_error(name: [u8; 4], code: i32) -> Vec<u8> {
    compose(FLAG_ERROR, name, &code.to_be_bytes())
}

/// The 16-byte end-of-list marker.
pub fn compose_sentinel() -> [u8; 16] {
    SENTINEL
}

/// Decode one element off the front of a buffer.
///
/// Returns `(header, value, consumed)`; a sentinel yields an empty value
/// and consumes all 16 bytes.
pub fn parse(buffer: &[u8]) -> Result<(ElementHeader, &[u8], usize), FramingError> {
    let header = ElementHeader::parse(buffer)?;
    if header.is_sentinel() {
        if buffer.len() < SENTINEL.len() {
            return Err(FramingError::Truncated {
                needed: SENTINEL.len(),
                have: buffer.len(),
            });
        }
        return Ok((header, &[], SENTINEL.len()));
    }

    let total = ELEMENT_HEADER_LEN + header.size as usize;
    if buffer.len() < total {
        return Err(FramingError::Truncated {
            needed: total,
            have: buffer.len(),
        });
    }
    Ok((header, &buffer[ELEMENT_HEADER_LEN..total], total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_element_matches_reference() {
        // GET_PROPERTY request element for "dbug": 4-byte zero placeholder.
        let encoded = compose(0, *b"dbug", &[0u8; 4]);
        assert_eq!(hex::encode(&encoded), "64627567000000000000000400000000");
    }

    #[test]
    fn parse_reference_value() {
        let bytes = hex::decode("64627567000000000000000400003000").unwrap();
        let (header, value, consumed) = parse(&bytes).unwrap();
        assert_eq!(&header.name, b"dbug");
        assert_eq!(header.flags, 0);
        assert_eq!(consumed, 16);
        assert_eq!(u32::from_be_bytes(value.try_into().unwrap()), 0x3000);
    }

    #[test]
    fn sentinel_consumes_sixteen_bytes() {
        let mut buffer = SENTINEL.to_vec();
        buffer.extend_from_slice(b"next");
        let (header, value, consumed) = parse(&buffer).unwrap();
        assert!(header.is_sentinel());
        assert!(value.is_empty());
        assert_eq!(consumed, 16);
    }

    #[test]
    fn truncated_sentinel_is_rejected() {
        assert!(matches!(
            parse(&[0u8; 12]),
            Err(FramingError::Truncated { needed: 16, .. })
        ));
    }

    #[test]
    fn error_element_roundtrip() {
        let encoded = compose_error(*b"dbug", -10);
        let (header, value, _) = parse(&encoded).unwrap();
        assert!(header.is_error());
        assert_eq!(i32::from_be_bytes(value.try_into().unwrap()), -10);
    }

    #[test]
    fn truncated_value_is_rejected() {
        let mut encoded = compose(0, *b"syNm", b"Base Station");
        encoded.truncate(encoded.len() - 2);
        assert!(matches!(parse(&encoded), Err(FramingError::Truncated { .. })));
    }

    #[test]
    fn zero_name_with_nonzero_size_is_not_a_sentinel() {
        let encoded = compose(0, [0u8; 4], &[1, 2, 3]);
        let (header, value, _) = parse(&encoded).unwrap();
        assert!(!header.is_sentinel());
        assert_eq!(value, &[1, 2, 3]);
    }
}
