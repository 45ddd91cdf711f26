//! Obfuscation keystream for the unencrypted header password field.
//!
//! This hides the password from casual packet inspection only; real
//! confidentiality comes from the post-auth AES-128-CTR session layer.

/// Fixed 16-byte key baked into every firmware build.
const STATIC_KEY: [u8; 16] = [
    0x5b, 0x6f, 0xaf, 0x5d, 0x9d, 0x5b, 0x0e, 0x13, 0x51, 0xf2, 0xda, 0x1d, 0xe7, 0xe8, 0xd6, 0x73,
];

/// Length of the header key field.
pub const HEADER_KEY_LEN: usize = 32;

/// Produce `n` keystream bytes.
///
/// Byte `i` is `((i + 0x55) & 0xff) ^ STATIC_KEY[i % 16]`.
pub fn keystream(n: usize) -> Vec<u8> {
    (0..n)
        .map(|i| ((i as u8).wrapping_add(0x55)) ^ STATIC_KEY[i % STATIC_KEY.len()])
        .collect()
}

/// Obfuscate a password into the 32-byte header key field.
///
/// The UTF-8 password is truncated to 32 bytes, zero-padded to exactly 32,
/// and XORed with the keystream. The empty password yields the raw
/// keystream, which is what pre-auth commands carry.
pub fn generate_header_key(password: &str) -> [u8; 32] {
    let mut key = [0u8; HEADER_KEY_LEN];
    let bytes = password.as_bytes();
    let take = bytes.len().min(HEADER_KEY_LEN);
    key[..take].copy_from_slice(&bytes[..take]);

    for (k, s) in key.iter_mut().zip(keystream(HEADER_KEY_LEN)) {
        *k ^= s;
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keystream_20_matches_reference() {
        assert_eq!(
            hex::encode(keystream(20)),
            "0e39f805c401554f0cac857d868ab5173e09c835"
        );
    }

    #[test]
    fn keystream_repeats_static_key_with_rolling_counter() {
        let ks = keystream(48);
        // Byte 16 uses STATIC_KEY[0] again but counter 0x65.
        assert_eq!(ks[16], 0x65 ^ 0x5b);
        assert_eq!(ks[32], 0x75 ^ 0x5b);
    }

    #[test]
    fn header_key_testing_matches_reference() {
        assert_eq!(
            hex::encode(generate_header_key("testing")),
            "7a5c8b71ad6f324f0cac857d868ab5173e09c835f431657f3c9cb56d969aa507"
        );
    }

    #[test]
    fn empty_password_yields_raw_keystream() {
        assert_eq!(generate_header_key("").to_vec(), keystream(32));
    }

    #[test]
    fn long_password_is_truncated_to_32_bytes() {
        let long = "a".repeat(64);
        let short = "a".repeat(32);
        assert_eq!(generate_header_key(&long), generate_header_key(&short));
    }
}
