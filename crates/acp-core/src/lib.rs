//! # acp-core
//!
//! Core types, constants, and error definitions shared across all ACP crates.
//!
//! This crate provides:
//! - The `Command` enumeration for the wire protocol
//! - Protocol version and port constants
//! - Per-property and authentication error codes
//! - Common error types

pub mod command;
pub mod error;

pub use command::Command;
pub use error::{
    AuthError, Error, FirmwareError, FramingError, PayloadError, PropertyError, Result, RpcError,
    SessionError,
};

/// Default TCP port the base station listens on.
pub const DEFAULT_PORT: u16 = 5009;

/// Protocol version spoken by original hardware revisions.
pub const PROTOCOL_VERSION_LEGACY: i32 = 0x0000_0001;

/// Protocol version spoken by current firmware; all composed messages use it.
pub const PROTOCOL_VERSION: i32 = 0x0003_0001;

/// Per-element and authentication error codes returned by the base station.
pub mod status {
    /// Property exists but has no value on this hardware.
    pub const NOT_AVAILABLE: i32 = -10;

    /// Property name is not recognized by the station.
    pub const INVALID_KEY: i32 = -16;

    /// Observed on current firmware; meaning unestablished.
    pub const UNKNOWN_6772: i32 = -6772;

    /// SRP proof verification failed on the server.
    pub const INCORRECT_PASSWORD: i32 = -6754;
}
