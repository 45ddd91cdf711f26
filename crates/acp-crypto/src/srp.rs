//! SRP-6a implementation for the AUTHENTICATE exchange.
//!
//! Uses the 1536-bit prime from RFC 5054, generator g=2, SHA-1.
//! Both the station (server) and the administration client are
//! implemented; the server keeps a verifier and can re-challenge after a
//! failed proof without tearing the connection down.

use acp_core::error::AuthError;
use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// N size in bytes (1536 bits = 192 bytes).
const N_BYTES: usize = 192;

/// RFC 5054 1536-bit prime N as hex string.
const RFC5054_N_1536: &str = concat!(
    "9DEF3CAFB939277AB1F12A8617A47BBBDBA51DF499AC4C80BEEEA961",
    "4B19CC4D5F4F5F556E27CBDE51C6A94BE4607A291558903BA0D0F843",
    "80B655BB9A22E8DCDF028A7CEC67F0D08134B1C8B97989149B609E0B",
    "E3BAB63D47548381DBC5B1FC764E3F4B53DD9DA1158BFD3E2B9C8CF5",
    "6EDF019539349627DB2FD53D24B7C48665772E437D6C7F8CE442734A",
    "F7CCB7AE837C264AE3A9BEB87F8A2FE9B8B5292E5A021FFF5E91479E",
    "8CE7A28C2442C6F315180F93499A234DCF76E3FED135F9BB"
);

/// SRP-6a parameters (1536-bit, RFC 5054).
pub struct SrpParams {
    /// Prime modulus N.
    pub n: BigUint,
    /// Generator g (always 2).
    pub g: BigUint,
}

impl Default for SrpParams {
    fn default() -> Self {
        let n = BigUint::parse_bytes(RFC5054_N_1536.as_bytes(), 16)
            .expect("Invalid RFC 5054 prime constant");
        let g = BigUint::from(2u32);
        Self { n, g }
    }
}

impl SrpParams {
    /// Generator as trimmed big-endian bytes for the wire.
    pub fn generator_bytes(&self) -> Vec<u8> {
        self.g.to_bytes_be()
    }

    /// Modulus as trimmed big-endian bytes for the wire.
    pub fn modulus_bytes(&self) -> Vec<u8> {
        self.n.to_bytes_be()
    }

    /// Whether wire-format group fields name this group.
    ///
    /// Peers send `generator`/`modulus` as big-endian integer bytes,
    /// sometimes with leading zero padding; both forms are accepted.
    pub fn matches_wire(&self, generator: &[u8], modulus: &[u8]) -> bool {
        BigUint::from_bytes_be(generator) == self.g && BigUint::from_bytes_be(modulus) == self.n
    }
}

/// Client-side SRP state.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SrpClient {
    #[zeroize(skip)]
    params: SrpParams,
    identity: Vec<u8>,
    password: Vec<u8>,
    private_key: Vec<u8>,
    #[zeroize(skip)]
    public_key: BigUint,
}

/// Server challenge: salt plus server public key B.
pub struct SrpChallenge {
    pub salt: [u8; 16],
    pub server_public_key: Vec<u8>,
}

/// Result of processing a challenge on the client.
pub struct SrpProof {
    /// M1, sent to the server.
    pub client_proof: Vec<u8>,
    /// K, the session key both sides derive.
    pub shared_secret: Vec<u8>,
    /// M2 the server must answer with.
    pub expected_server_proof: Vec<u8>,
}

/// Result of a successful verification on the server.
pub struct SrpServerProof {
    /// M2, sent back to the client.
    pub server_proof: Vec<u8>,
    /// K, the session key both sides derive.
    pub shared_secret: Vec<u8>,
}

impl SrpClient {
    /// Create a new SRP client with identity and password.
    ///
    /// For this protocol the identity is always `admin`.
    pub fn new(identity: &[u8], password: &[u8]) -> Self {
        let params = SrpParams::default();

        let a = OsRng.gen_biguint(256);
        let private_key = a.to_bytes_be();
        let public_key = params.g.modpow(&a, &params.n);

        Self {
            params,
            identity: identity.to_vec(),
            password: password.to_vec(),
            private_key,
            public_key,
        }
    }

    #[cfg(test)]
    pub fn with_private_key(identity: &[u8], password: &[u8], private_key: &[u8]) -> Self {
        let params = SrpParams::default();
        let a = BigUint::from_bytes_be(private_key);
        let public_key = params.g.modpow(&a, &params.n);

        Self {
            params,
            identity: identity.to_vec(),
            password: password.to_vec(),
            private_key: private_key.to_vec(),
            public_key,
        }
    }

    /// Client public key A, trimmed big-endian.
    pub fn public_key(&self) -> Vec<u8> {
        self.public_key.to_bytes_be()
    }

    /// Process the server's challenge and generate the proof material.
    pub fn process_challenge(&self, challenge: &SrpChallenge) -> Result<SrpProof, AuthError> {
        let b = BigUint::from_bytes_be(&challenge.server_public_key);

        if &b % &self.params.n == BigUint::ZERO {
            return Err(AuthError::InvalidParameter("server public key"));
        }

        let a = BigUint::from_bytes_be(&self.private_key);

        let u = compute_u(&self.public_key, &b, &self.params);
        if u == BigUint::ZERO {
            return Err(AuthError::InvalidParameter("scrambler u"));
        }

        let x = compute_x(&challenge.salt, &self.identity, &self.password);
        let k = compute_k(&self.params);

        // S = (B - k * g^x)^(a + u*x) mod N
        let g_x = self.params.g.modpow(&x, &self.params.n);
        let k_gx = (&k * &g_x) % &self.params.n;
        let base = if b >= k_gx {
            (&b - &k_gx) % &self.params.n
        } else {
            (&b + &self.params.n - &k_gx) % &self.params.n
        };
        let exponent = &a + &u * &x;
        let s = base.modpow(&exponent, &self.params.n);

        let shared_secret = hash_session_key(&s);

        let client_proof = compute_m1(
            &self.params,
            &self.identity,
            &challenge.salt,
            &self.public_key,
            &b,
            &shared_secret,
        );
        let expected_server_proof = compute_m2(&self.public_key, &client_proof, &shared_secret);

        Ok(SrpProof {
            client_proof,
            shared_secret,
            expected_server_proof,
        })
    }

    /// Verify the server's M2 in constant time.
    pub fn verify_server_proof(&self, proof: &[u8], expected: &[u8]) -> bool {
        proof.ct_eq(expected).into()
    }
}

/// Server-side SRP state for one challenge round.
pub struct SrpServer {
    params: SrpParams,
    identity: Vec<u8>,
    salt: [u8; 16],
    verifier: BigUint,
    private_key: BigUint,
    public_key: BigUint,
}

impl SrpServer {
    /// Create server state from the stored credentials.
    ///
    /// The salt is the user record's; callers pass a fresh random salt for
    /// accounts whose password was never set through this path.
    pub fn new(identity: &[u8], password: &[u8], salt: [u8; 16]) -> Self {
        let params = SrpParams::default();

        let x = compute_x(&salt, identity, password);
        let verifier = params.g.modpow(&x, &params.n);

        let b = OsRng.gen_biguint(256);
        let k = compute_k(&params);

        // B = (k*v + g^b) mod N
        let g_b = params.g.modpow(&b, &params.n);
        let k_v = (&k * &verifier) % &params.n;
        let public_key = (&k_v + &g_b) % &params.n;

        Self {
            params,
            identity: identity.to_vec(),
            salt,
            verifier,
            private_key: b,
            public_key,
        }
    }

    /// Parameters in use (for serializing generator/modulus to the wire).
    pub fn params(&self) -> &SrpParams {
        &self.params
    }

    /// The challenge to send to the client.
    pub fn challenge(&self) -> SrpChallenge {
        SrpChallenge {
            salt: self.salt,
            server_public_key: pad_to_n(&self.public_key),
        }
    }

    /// Verify the client's proof M1; on success return M2 and the session key.
    pub fn verify(
        &self,
        client_public_key: &[u8],
        client_proof: &[u8],
    ) -> Result<SrpServerProof, AuthError> {
        let a = BigUint::from_bytes_be(client_public_key);

        if &a % &self.params.n == BigUint::ZERO {
            return Err(AuthError::InvalidParameter("client public key"));
        }

        let u = compute_u(&a, &self.public_key, &self.params);

        // S = (A * v^u)^b mod N
        let v_u = self.verifier.modpow(&u, &self.params.n);
        let base = (&a * &v_u) % &self.params.n;
        let s = base.modpow(&self.private_key, &self.params.n);

        let shared_secret = hash_session_key(&s);

        let expected_m1 = compute_m1(
            &self.params,
            &self.identity,
            &self.salt,
            &a,
            &self.public_key,
            &shared_secret,
        );

        let ok: bool = client_proof.ct_eq(&expected_m1).into();
        if !ok {
            return Err(AuthError::ProofMismatch);
        }

        let server_proof = compute_m2(&a, &expected_m1, &shared_secret);
        Ok(SrpServerProof {
            server_proof,
            shared_secret,
        })
    }
}

/// K = SHA1(PAD(S)).
fn hash_session_key(s: &BigUint) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(pad_to_n(s));
    hasher.finalize().to_vec()
}

/// M1 = H(H(N) XOR H(g) || H(I) || salt || PAD(A) || PAD(B) || K).
fn compute_m1(
    params: &SrpParams,
    identity: &[u8],
    salt: &[u8],
    a: &BigUint,
    b: &BigUint,
    k: &[u8],
) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(pad_to_n(&params.n));
    let h_n = hasher.finalize();

    // H(g) is over the raw generator byte, not PAD(g); only k pads g.
    let mut hasher = Sha1::new();
    hasher.update(params.g.to_bytes_be());
    let h_g = hasher.finalize();

    let mut xor_result = [0u8; 20];
    for i in 0..20 {
        xor_result[i] = h_n[i] ^ h_g[i];
    }

    let mut hasher = Sha1::new();
    hasher.update(identity);
    let h_i = hasher.finalize();

    let mut hasher = Sha1::new();
    hasher.update(xor_result);
    hasher.update(h_i);
    hasher.update(salt);
    hasher.update(pad_to_n(a));
    hasher.update(pad_to_n(b));
    hasher.update(k);
    hasher.finalize().to_vec()
}

/// M2 = H(PAD(A) || M1 || K).
fn compute_m2(a: &BigUint, m1: &[u8], k: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(pad_to_n(a));
    hasher.update(m1);
    hasher.update(k);
    hasher.finalize().to_vec()
}

/// Pad a value to N_BYTES with leading zeros.
fn pad_to_n(value: &BigUint) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= N_BYTES {
        bytes[bytes.len() - N_BYTES..].to_vec()
    } else {
        let mut padded = vec![0u8; N_BYTES - bytes.len()];
        padded.extend_from_slice(&bytes);
        padded
    }
}

/// k = SHA1(N || PAD(g)).
fn compute_k(params: &SrpParams) -> BigUint {
    let mut hasher = Sha1::new();
    hasher.update(pad_to_n(&params.n));
    hasher.update(pad_to_n(&params.g));
    BigUint::from_bytes_be(&hasher.finalize())
}

/// u = SHA1(PAD(A) || PAD(B)).
fn compute_u(a: &BigUint, b: &BigUint, _params: &SrpParams) -> BigUint {
    let mut hasher = Sha1::new();
    hasher.update(pad_to_n(a));
    hasher.update(pad_to_n(b));
    BigUint::from_bytes_be(&hasher.finalize())
}

/// x = SHA1(salt || SHA1(identity || ":" || password)).
fn compute_x(salt: &[u8], identity: &[u8], password: &[u8]) -> BigUint {
    let mut hasher = Sha1::new();
    hasher.update(identity);
    hasher.update(b":");
    hasher.update(password);
    let inner = hasher.finalize();

    let mut hasher = Sha1::new();
    hasher.update(salt);
    hasher.update(inner);
    BigUint::from_bytes_be(&hasher.finalize())
}
