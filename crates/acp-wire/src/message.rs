//! Message framing: the 128-byte big-endian header plus optional body.
//!
//! The header carries two Adler-32 checksums: one over the header itself
//! (computed with the checksum field zeroed) and one over the body. A body
//! size of `-1` marks a header-only or streaming frame.

use acp_core::error::FramingError;
use acp_core::{Command, PROTOCOL_VERSION, PROTOCOL_VERSION_LEGACY};
use acp_crypto::generate_header_key;
use adler32::RollingAdler32;
use bytes::{Buf, BufMut};

/// Header magic.
pub const HEADER_MAGIC: &[u8; 4] = b"acpp";
/// Fixed header size on the wire.
pub const HEADER_LEN: usize = 128;
/// Body size value marking a frame with no in-band body.
pub const BODY_SIZE_STREAM: i32 = -1;

/// Adler-32 over a byte slice.
pub(crate) fn adler32(data: &[u8]) -> u32 {
    let mut hasher = RollingAdler32::new();
    hasher.update_buffer(data);
    hasher.hash()
}

/// One protocol exchange unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: i32,
    pub flags: i32,
    pub unused: i32,
    pub command: Command,
    pub error_code: i32,
    /// Obfuscated password, or zeros once session encryption is active.
    pub key: [u8; 32],
    pub body: Option<Vec<u8>>,
    pub body_size: i32,
    pub body_checksum: u32,
}

impl Message {
    /// Build a request frame.
    ///
    /// `AUTHENTICATE` and `GET_FEATURES` run pre-encryption without a
    /// password and always carry the empty-password key; every other
    /// command obfuscates `password`, or sends zeros when the session
    /// cipher already protects the connection.
    fn request(
        command: Command,
        password: Option<&str>,
        flags: i32,
        body: Option<Vec<u8>>,
    ) -> Self {
        let key = if command.is_pre_auth() {
            generate_header_key("")
        } else {
            match password {
                Some(pw) => generate_header_key(pw),
                None => [0u8; 32],
            }
        };
        Self::with_key(command, key, flags, 0, body)
    }

    /// Build a response frame. Responses never carry a password.
    pub fn response(command: Command, error_code: i32, body: Option<Vec<u8>>) -> Self {
        Self::with_key(command, [0u8; 32], 0, error_code, body)
    }

    fn with_key(
        command: Command,
        key: [u8; 32],
        flags: i32,
        error_code: i32,
        body: Option<Vec<u8>>,
    ) -> Self {
        let (body_size, body_checksum) = match &body {
            Some(b) => (b.len() as i32, adler32(b)),
            None => (BODY_SIZE_STREAM, 1),
        };
        Self {
            version: PROTOCOL_VERSION,
            flags,
            unused: 0,
            command,
            error_code,
            key,
            body,
            body_size,
            body_checksum,
        }
    }

    pub fn echo(password: Option<&str>, flags: i32, payload: Vec<u8>) -> Self {
        Self::request(Command::Echo, password, flags, Some(payload))
    }

    pub fn get_prop(password: Option<&str>, flags: i32, payload: Vec<u8>) -> Self {
        Self::request(Command::GetProperty, password, flags, Some(payload))
    }

    pub fn set_prop(password: Option<&str>, flags: i32, payload: Vec<u8>) -> Self {
        Self::request(Command::SetProperty, password, flags, Some(payload))
    }

    pub fn perform(password: Option<&str>, flags: i32, payload: Vec<u8>) -> Self {
        Self::request(Command::Perform, password, flags, Some(payload))
    }

    pub fn monitor(password: Option<&str>, flags: i32, payload: Vec<u8>) -> Self {
        Self::request(Command::Monitor, password, flags, Some(payload))
    }

    pub fn rpc(password: Option<&str>, flags: i32, payload: Vec<u8>) -> Self {
        Self::request(Command::Rpc, password, flags, Some(payload))
    }

    pub fn auth(flags: i32, payload: Vec<u8>) -> Self {
        Self::request(Command::Authenticate, None, flags, Some(payload))
    }

    pub fn features(flags: i32) -> Self {
        Self::request(Command::GetFeatures, None, flags, None)
    }

    pub fn flash_primary(password: Option<&str>, flags: i32, image: Vec<u8>) -> Self {
        Self::request(Command::FlashPrimary, password, flags, Some(image))
    }

    pub fn flash_secondary(password: Option<&str>, flags: i32, image: Vec<u8>) -> Self {
        Self::request(Command::FlashSecondary, password, flags, Some(image))
    }

    pub fn flash_bootloader(password: Option<&str>, flags: i32, image: Vec<u8>) -> Self {
        Self::request(Command::FlashBootloader, password, flags, Some(image))
    }

    /// Serialize the header with an explicit checksum field value.
    pub fn encode_header(&self, header_checksum: u32) -> [u8; HEADER_LEN] {
        let mut out = Vec::with_capacity(HEADER_LEN);
        out.put_slice(HEADER_MAGIC);
        out.put_i32(self.version);
        out.put_u32(header_checksum);
        out.put_u32(self.body_checksum);
        out.put_i32(self.body_size);
        out.put_i32(self.flags);
        out.put_i32(self.unused);
        out.put_i32(self.command.as_i32());
        out.put_i32(self.error_code);
        out.put_bytes(0, 12);
        out.put_slice(&self.key);
        out.put_bytes(0, 48);

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&out);
        header
    }

    /// Serialize the full frame, filling in the header checksum.
    pub fn compose(&self) -> Vec<u8> {
        let header = self.encode_header(0);
        let checksum = adler32(&header);

        let body_len = self.body.as_ref().map_or(0, Vec::len);
        let mut out = Vec::with_capacity(HEADER_LEN + body_len);
        out.extend_from_slice(&header);
        out[8..12].copy_from_slice(&checksum.to_be_bytes());
        if let Some(body) = &self.body {
            out.extend_from_slice(body);
        }
        out
    }

    /// Parse the 128 header bytes only; the body is attached separately.
    pub fn parse_header(buffer: &[u8]) -> Result<Self, FramingError> {
        if buffer.len() < HEADER_LEN {
            return Err(FramingError::Truncated {
                needed: HEADER_LEN,
                have: buffer.len(),
            });
        }
        let mut buf = &buffer[..HEADER_LEN];

        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if &magic != HEADER_MAGIC {
            return Err(FramingError::BadMagic);
        }

        let version = buf.get_i32();
        if version != PROTOCOL_VERSION && version != PROTOCOL_VERSION_LEGACY {
            return Err(FramingError::UnknownVersion(version));
        }

        let header_checksum = buf.get_u32();
        let body_checksum = buf.get_u32();
        let body_size = buf.get_i32();
        let flags = buf.get_i32();
        let unused = buf.get_i32();
        let command_raw = buf.get_i32();
        let error_code = buf.get_i32();
        buf.advance(12);
        let mut key = [0u8; 32];
        buf.copy_to_slice(&mut key);

        let mut zeroed = [0u8; HEADER_LEN];
        zeroed.copy_from_slice(&buffer[..HEADER_LEN]);
        zeroed[8..12].fill(0);
        let expected = adler32(&zeroed);
        if header_checksum != expected {
            return Err(FramingError::HeaderChecksum {
                expected,
                found: header_checksum,
            });
        }

        let command =
            Command::from_i32(command_raw).ok_or(FramingError::UnknownCommand(command_raw))?;

        Ok(Self {
            version,
            flags,
            unused,
            command,
            error_code,
            key,
            body: None,
            body_size,
            body_checksum,
        })
    }

    /// Attach and verify body bytes read after the header.
    pub fn attach_body(&mut self, body: Vec<u8>) -> Result<(), FramingError> {
        if self.body_size == BODY_SIZE_STREAM {
            if !body.is_empty() {
                return Err(FramingError::StreamHeaderWithBody);
            }
            return Ok(());
        }
        if body.len() != self.body_size as usize {
            return Err(FramingError::BodyLengthMismatch {
                expected: self.body_size,
                found: body.len(),
            });
        }
        let computed = adler32(&body);
        if computed != self.body_checksum {
            return Err(FramingError::BodyChecksum {
                expected: self.body_checksum,
                found: computed,
            });
        }
        self.body = Some(body);
        Ok(())
    }

    /// Parse a complete frame, discarding any bytes past the body.
    ///
    /// A streaming header followed by body bytes is malformed here; use
    /// [`parse_with_remainder`] when the tail may hold further frames.
    ///
    /// [`parse_with_remainder`]: Message::parse_with_remainder
    pub fn parse(buffer: &[u8]) -> Result<Self, FramingError> {
        let (message, remainder) = Self::parse_with_remainder(buffer)?;
        if message.body_size == BODY_SIZE_STREAM && !remainder.is_empty() {
            return Err(FramingError::StreamHeaderWithBody);
        }
        Ok(message)
    }

    /// Parse one frame off the front of a buffer, returning the tail.
    pub fn parse_with_remainder(buffer: &[u8]) -> Result<(Self, &[u8]), FramingError> {
        let mut message = Self::parse_header(buffer)?;
        let rest = &buffer[HEADER_LEN..];

        if message.body_size < 0 {
            return Ok((message, rest));
        }

        let size = message.body_size as usize;
        if rest.len() < size {
            return Err(FramingError::Truncated {
                needed: HEADER_LEN + size,
                have: buffer.len(),
            });
        }
        message.attach_body(rest[..size].to_vec())?;
        Ok((message, &rest[size..]))
    }
}
