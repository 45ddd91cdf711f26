//! Firmware image header.

use acp_core::error::FirmwareError;
use bytes::BufMut;

/// Header magic, NUL included.
pub const HEADER_MAGIC: &[u8; 15] = b"APPLE-FIRMWARE\0";
/// Fixed header size.
pub const HEADER_LEN: usize = 32;
/// Flags bit 1: the body is encrypted.
pub const FLAG_ENCRYPTED: u8 = 0x02;

/// Parsed 32-byte image header.
///
/// The byte at offset 0x0f doubles as the final byte of the AES IV, so the
/// IV is exactly the first 16 header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    raw: [u8; HEADER_LEN],
    pub model: u32,
    pub version: u32,
    pub flags: u8,
}

impl ImageHeader {
    /// Parse the leading 32 bytes of an image.
    pub fn parse(bytes: &[u8]) -> Result<Self, FirmwareError> {
        if bytes.len() < HEADER_LEN {
            return Err(FirmwareError::NotEnoughData);
        }
        if &bytes[..HEADER_MAGIC.len()] != HEADER_MAGIC {
            return Err(FirmwareError::BadMagic);
        }

        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(&bytes[..HEADER_LEN]);

        Ok(Self {
            raw,
            model: u32::from_be_bytes([raw[16], raw[17], raw[18], raw[19]]),
            version: u32::from_be_bytes([raw[20], raw[21], raw[22], raw[23]]),
            flags: raw[27],
        })
    }

    /// Build a header for composing an image.
    pub fn new(model: u32, version: u32, iv_byte: u8, encrypted: bool) -> Self {
        let mut raw = Vec::with_capacity(HEADER_LEN);
        raw.put_slice(HEADER_MAGIC);
        raw.put_u8(iv_byte);
        raw.put_u32(model);
        raw.put_u32(version);
        raw.put_bytes(0, 3);
        raw.put_u8(if encrypted { FLAG_ENCRYPTED } else { 0 });
        raw.put_u32(0);

        let mut fixed = [0u8; HEADER_LEN];
        fixed.copy_from_slice(&raw);
        Self {
            raw: fixed,
            model,
            version,
            flags: if encrypted { FLAG_ENCRYPTED } else { 0 },
        }
    }

    /// The raw header bytes as transmitted.
    pub fn as_bytes(&self) -> &[u8; HEADER_LEN] {
        &self.raw
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// The body cipher IV: magic plus the byte at offset 0x0f.
    pub fn iv(&self) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&self.raw[..16]);
        iv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_bytes() {
        let header = ImageHeader::new(107, 0x0007_7400, 0xa5, true);
        let parsed = ImageHeader::parse(header.as_bytes()).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.model, 107);
        assert_eq!(parsed.version, 0x0007_7400);
        assert!(parsed.is_encrypted());
    }

    #[test]
    fn iv_is_magic_plus_offset_0x0f() {
        let header = ImageHeader::new(120, 1, 0x42, true);
        let iv = header.iv();
        assert_eq!(&iv[..15], HEADER_MAGIC.as_slice());
        assert_eq!(iv[15], 0x42);
    }

    #[test]
    fn plain_image_flag() {
        let header = ImageHeader::new(115, 2, 0, false);
        assert!(!header.is_encrypted());
    }

    #[test]
    fn short_buffer_is_not_enough_data() {
        assert!(matches!(
            ImageHeader::parse(&[0u8; 16]),
            Err(FirmwareError::NotEnoughData)
        ));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut bytes = *ImageHeader::new(107, 1, 0, false).as_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            ImageHeader::parse(&bytes),
            Err(FirmwareError::BadMagic)
        ));
    }
}
