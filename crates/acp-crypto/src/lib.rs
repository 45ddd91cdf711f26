//! # acp-crypto
//!
//! Cryptographic building blocks for the ACP protocol:
//!
//! - Header-key obfuscation keystream (not cryptographically secure)
//! - PBKDF2 derivation of the two directional session keys
//! - AES-128-CTR directional stream ciphers
//! - Per-chunk AES-128-CBC used by the firmware codec
//! - SRP-6a over the 1536-bit group with SHA-1

pub mod cbc;
pub mod kdf;
pub mod keystream;
pub mod srp;
pub mod stream;

pub use cbc::ChunkCipher;
pub use kdf::{derive_client_key, derive_server_key};
pub use keystream::{generate_header_key, keystream};
pub use srp::{SrpChallenge, SrpClient, SrpProof, SrpServer, SrpServerProof};
pub use stream::DirectionCipher;
