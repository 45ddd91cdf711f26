//! Decrypt pipeline: per-chunk AES-128-CBC plus trailing checksum.

use acp_core::error::FirmwareError;
use acp_crypto::ChunkCipher;
use adler32::RollingAdler32;

use crate::image::{ImageHeader, HEADER_LEN};
use crate::keys::derive_model_key;

/// Body chunk size; CBC restarts at the header IV on every chunk.
pub const CHUNK_SIZE: usize = 32768;

/// Push-style firmware decryptor.
///
/// Feed arbitrary slices with [`update`]; each call returns the plaintext
/// that became available. [`finish`] flushes the final partial chunk and
/// verifies the trailing Adler-32 over header and decrypted body.
///
/// [`update`]: FirmwareDecryptor::update
/// [`finish`]: FirmwareDecryptor::finish
pub struct FirmwareDecryptor {
    header: Option<ImageHeader>,
    cipher: Option<ChunkCipher>,
    pending: Vec<u8>,
    checksum: RollingAdler32,
}

impl FirmwareDecryptor {
    pub fn new() -> Self {
        Self {
            header: None,
            cipher: None,
            pending: Vec::new(),
            checksum: RollingAdler32::new(),
        }
    }

    /// The parsed header, once 32 bytes have been fed.
    pub fn header(&self) -> Option<&ImageHeader> {
        self.header.as_ref()
    }

    /// Feed image bytes; returns any newly decrypted body bytes.
    pub fn update(&mut self, data: &[u8]) -> Result<Vec<u8>, FirmwareError> {
        self.pending.extend_from_slice(data);

        if self.header.is_none() {
            if self.pending.len() < HEADER_LEN {
                return Ok(Vec::new());
            }
            let header = ImageHeader::parse(&self.pending)?;
            self.checksum.update_buffer(header.as_bytes());
            if header.is_encrypted() {
                let key = derive_model_key(header.model)?;
                self.cipher = Some(ChunkCipher::new(key, header.iv()));
            }
            self.header = Some(header);
            self.pending.drain(..HEADER_LEN);
        }

        let mut out = Vec::new();
        // Hold back 4 bytes: the trailing checksum must not be decrypted.
        while self.pending.len() >= CHUNK_SIZE + 4 {
            let chunk: Vec<u8> = self.pending.drain(..CHUNK_SIZE).collect();
            out.extend_from_slice(&self.decrypt_chunk(&chunk));
        }
        Ok(out)
    }

    /// Flush the final chunk and verify the image checksum.
    pub fn finish(mut self) -> Result<Vec<u8>, FirmwareError> {
        if self.header.is_none() || self.pending.len() < 4 {
            return Err(FirmwareError::NotEnoughData);
        }

        let trailer_at = self.pending.len() - 4;
        let trailer = self.pending.split_off(trailer_at);
        let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);

        let last = std::mem::take(&mut self.pending);
        let out = self.decrypt_chunk(&last);

        let computed = self.checksum.hash();
        if computed != expected {
            return Err(FirmwareError::BadChecksum { expected, computed });
        }
        Ok(out)
    }

    fn decrypt_chunk(&mut self, chunk: &[u8]) -> Vec<u8> {
        let plain = match &self.cipher {
            Some(cipher) => cipher.decrypt_chunk(chunk),
            None => chunk.to_vec(),
        };
        self.checksum.update_buffer(&plain);
        plain
    }
}

impl Default for FirmwareDecryptor {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot decrypt of a complete image buffer.
pub fn decrypt(image: &[u8]) -> Result<Vec<u8>, FirmwareError> {
    let mut decryptor = FirmwareDecryptor::new();
    let mut body = decryptor.update(image)?;
    body.extend_from_slice(&decryptor.finish()?);
    Ok(body)
}

/// Compose an image: the exact inverse of [`decrypt`], used to build
/// fixtures and stage uploads.
pub fn encrypt_image(
    model: u32,
    version: u32,
    iv_byte: u8,
    body: &[u8],
    encrypted: bool,
) -> Result<Vec<u8>, FirmwareError> {
    let header = ImageHeader::new(model, version, iv_byte, encrypted);

    let mut checksum = RollingAdler32::new();
    checksum.update_buffer(header.as_bytes());
    checksum.update_buffer(body);

    let mut out = Vec::with_capacity(HEADER_LEN + body.len() + 4);
    out.extend_from_slice(header.as_bytes());

    if encrypted {
        let key = derive_model_key(model)?;
        let cipher = ChunkCipher::new(key, header.iv());
        for chunk in body.chunks(CHUNK_SIZE) {
            out.extend_from_slice(&cipher.encrypt_chunk(chunk));
        }
    } else {
        out.extend_from_slice(body);
    }

    out.extend_from_slice(&checksum.hash().to_be_bytes());
    Ok(out)
}
