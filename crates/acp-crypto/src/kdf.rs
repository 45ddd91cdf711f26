//! Session key derivation.
//!
//! The SRP shared secret is stretched into two independent AES-128 keys,
//! one per direction. The salts and iteration counts are fixed by the
//! firmware and are not negotiable.

use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;

/// Salt for the client-to-server key.
const CLIENT_SALT: [u8; 16] = [
    0xf0, 0x72, 0xfa, 0x3f, 0x66, 0xb4, 0x10, 0xa1, 0x35, 0xfa, 0xe8, 0xe6, 0xd1, 0xd4, 0x3d, 0x5f,
];

/// Salt for the server-to-client key.
const SERVER_SALT: [u8; 16] = [
    0xbd, 0x06, 0x82, 0xc9, 0xfe, 0x79, 0x32, 0x5b, 0xc7, 0x36, 0x55, 0xf4, 0x17, 0x4b, 0x99, 0x6c,
];

const CLIENT_ROUNDS: u32 = 5;
const SERVER_ROUNDS: u32 = 7;

/// Derive the AES-128 key for the client-to-server stream.
pub fn derive_client_key(session_key: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    pbkdf2_hmac::<Sha1>(session_key, &CLIENT_SALT, CLIENT_ROUNDS, &mut out);
    out
}

/// Derive the AES-128 key for the server-to-client stream.
pub fn derive_server_key(session_key: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    pbkdf2_hmac::<Sha1>(session_key, &SERVER_SALT, SERVER_ROUNDS, &mut out);
    out
}
