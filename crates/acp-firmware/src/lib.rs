//! # acp-firmware
//!
//! Codec for signed base-station firmware images: a 32-byte header, a body
//! that is AES-128-CBC encrypted per 32 KiB chunk, and a trailing Adler-32
//! over header plus decrypted body. The decrypted body embeds a gzip
//! stream holding the actual filesystem payload.
//!
//! Both stages come in two shapes: one-shot buffer functions for small
//! images, and push-style transforms for streaming large ones.

pub mod decrypt;
pub mod extract;
pub mod image;
pub mod keys;

pub use decrypt::{decrypt, encrypt_image, FirmwareDecryptor};
pub use extract::{extract, FirmwareExtractor};
pub use image::{ImageHeader, FLAG_ENCRYPTED, HEADER_LEN, HEADER_MAGIC};
pub use keys::derive_model_key;
