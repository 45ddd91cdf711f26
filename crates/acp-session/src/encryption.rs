//! Session encryption: AES-128-CTR in both directions.
//!
//! Installed once after a successful AUTHENTICATE exchange and kept until
//! the socket closes. The client-to-server stream uses the PBKDF2 client
//! key with the client IV; server-to-client uses the server key and IV. A
//! client encrypts outbound with the former and decrypts inbound with the
//! latter; a server does the reverse.
//!
//! This layer fails silently: garbled ciphertext surfaces later as a
//! header or checksum failure at the framing layer.

use acp_crypto::{derive_client_key, derive_server_key, DirectionCipher};

/// Which end of the connection this context serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Both directional cipher streams for one session.
pub struct EncryptionContext {
    outbound: DirectionCipher,
    inbound: DirectionCipher,
}

impl EncryptionContext {
    /// Derive both directional keys and set up the streams.
    ///
    /// `key` is the SRP shared secret; the IVs are the random values
    /// exchanged in auth stages 3 and 4.
    pub fn new(role: Role, key: &[u8], client_iv: [u8; 16], server_iv: [u8; 16]) -> Self {
        let c2s = DirectionCipher::new(derive_client_key(key), client_iv);
        let s2c = DirectionCipher::new(derive_server_key(key), server_iv);
        match role {
            Role::Client => Self {
                outbound: c2s,
                inbound: s2c,
            },
            Role::Server => Self {
                outbound: s2c,
                inbound: c2s,
            },
        }
    }

    /// Encrypt bytes about to be written.
    pub fn encrypt_outbound(&mut self, data: &mut [u8]) {
        self.outbound.apply(data);
    }

    /// Decrypt bytes just read.
    pub fn decrypt_inbound(&mut self, data: &mut [u8]) {
        self.inbound.apply(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = &[0x5au8; 20];
    const CLIENT_IV: [u8; 16] = [0x01; 16];
    const SERVER_IV: [u8; 16] = [0x02; 16];

    #[test]
    fn client_to_server_roundtrip() {
        let mut client = EncryptionContext::new(Role::Client, KEY, CLIENT_IV, SERVER_IV);
        let mut server = EncryptionContext::new(Role::Server, KEY, CLIENT_IV, SERVER_IV);

        let mut data = b"get dbug".to_vec();
        client.encrypt_outbound(&mut data);
        assert_ne!(&data, b"get dbug");
        server.decrypt_inbound(&mut data);
        assert_eq!(&data, b"get dbug");
    }

    #[test]
    fn server_to_client_roundtrip() {
        let mut client = EncryptionContext::new(Role::Client, KEY, CLIENT_IV, SERVER_IV);
        let mut server = EncryptionContext::new(Role::Server, KEY, CLIENT_IV, SERVER_IV);

        let mut data = b"dbug = 0x3000".to_vec();
        server.encrypt_outbound(&mut data);
        client.decrypt_inbound(&mut data);
        assert_eq!(&data, b"dbug = 0x3000");
    }

    #[test]
    fn directions_are_independent_streams() {
        let mut client = EncryptionContext::new(Role::Client, KEY, CLIENT_IV, SERVER_IV);

        let mut a = vec![0u8; 16];
        let mut b = vec![0u8; 16];
        client.encrypt_outbound(&mut a);
        client.decrypt_inbound(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn byte_alignment_survives_split_writes() {
        let mut whole = EncryptionContext::new(Role::Client, KEY, CLIENT_IV, SERVER_IV);
        let mut split = EncryptionContext::new(Role::Client, KEY, CLIENT_IV, SERVER_IV);

        let mut one = vec![0xaau8; 33];
        whole.encrypt_outbound(&mut one);

        let mut head = vec![0xaau8; 5];
        let mut tail = vec![0xaau8; 28];
        split.encrypt_outbound(&mut head);
        split.encrypt_outbound(&mut tail);
        head.extend_from_slice(&tail);

        assert_eq!(one, head);
    }
}
