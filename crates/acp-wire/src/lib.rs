//! # acp-wire
//!
//! Byte-level codecs for the ACP protocol:
//!
//! - `message`: the 128-byte checksummed header and per-command constructors
//! - `element`: the 12-byte property element format and its sentinel
//! - `property`: typed property values and the name registry
//! - `cflbinary`: the compact binary plist dialect used for structured payloads
//! - `monitor`: the unsolicited `"XE"` event frame format

pub mod cflbinary;
pub mod element;
pub mod message;
pub mod monitor;
pub mod property;

pub use cflbinary::Value;
pub use element::{ElementHeader, FLAG_ERROR, SENTINEL};
pub use message::Message;
pub use property::{PropName, Property, PropertyInfo, PropertyValue, ValueKind};
