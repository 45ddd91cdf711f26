//! AES-128-CTR directional stream cipher.
//!
//! One instance per direction; the keystream position advances
//! monotonically with every byte processed and is never rewound.

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes128;
use ctr::Ctr128BE;

type Aes128Ctr = Ctr128BE<Aes128>;

/// A single direction of the session encryption layer.
///
/// CTR mode is symmetric, so the same object encrypts on the sender and
/// decrypts on the receiver as long as both stay byte-aligned.
pub struct DirectionCipher {
    inner: Aes128Ctr,
}

impl DirectionCipher {
    /// Create a cipher from a derived key and the IV exchanged during auth.
    pub fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        Self {
            inner: Aes128Ctr::new(&key.into(), &iv.into()),
        }
    }

    /// Apply the keystream in place, advancing the stream position.
    pub fn apply(&mut self, data: &mut [u8]) {
        self.inner.apply_keystream(data);
    }
}
