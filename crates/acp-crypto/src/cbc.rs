//! AES-128-CBC without padding, restarted per chunk.
//!
//! The firmware body cipher runs CBC over the full 16-byte blocks of each
//! chunk and passes any trailing partial block through verbatim. Every
//! chunk restarts from the IV stored at construction.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use zeroize::ZeroizeOnDrop;

/// Per-chunk CBC cipher with a fixed IV.
#[derive(ZeroizeOnDrop)]
pub struct ChunkCipher {
    key: [u8; 16],
    #[zeroize(skip)]
    iv: [u8; 16],
}

impl ChunkCipher {
    /// Create a cipher with a 16-byte key and IV.
    pub fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        Self { key, iv }
    }

    /// Decrypt one chunk.
    ///
    /// Full 16-byte blocks are CBC-decrypted starting from the stored IV;
    /// trailing bytes shorter than one block are copied through unchanged.
    pub fn decrypt_chunk(&self, chunk: &[u8]) -> Vec<u8> {
        let cipher = Aes128::new(&self.key.into());
        let full_len = (chunk.len() / 16) * 16;

        let mut out = Vec::with_capacity(chunk.len());
        let mut prev = self.iv;

        for block_bytes in chunk[..full_len].chunks_exact(16) {
            let mut block = [0u8; 16];
            block.copy_from_slice(block_bytes);

            cipher.decrypt_block(aes::Block::from_mut_slice(&mut block));
            for i in 0..16 {
                block[i] ^= prev[i];
            }

            prev.copy_from_slice(block_bytes);
            out.extend_from_slice(&block);
        }

        out.extend_from_slice(&chunk[full_len..]);
        out
    }

    /// Encrypt one chunk; the exact inverse of [`decrypt_chunk`].
    ///
    /// [`decrypt_chunk`]: ChunkCipher::decrypt_chunk
    pub fn encrypt_chunk(&self, chunk: &[u8]) -> Vec<u8> {
        let cipher = Aes128::new(&self.key.into());
        let full_len = (chunk.len() / 16) * 16;

        let mut out = Vec::with_capacity(chunk.len());
        let mut prev = self.iv;

        for block_bytes in chunk[..full_len].chunks_exact(16) {
            let mut block = [0u8; 16];
            for i in 0..16 {
                block[i] = block_bytes[i] ^ prev[i];
            }

            cipher.encrypt_block(aes::Block::from_mut_slice(&mut block));

            prev = block;
            out.extend_from_slice(&block);
        }

        out.extend_from_slice(&chunk[full_len..]);
        out
    }
}
