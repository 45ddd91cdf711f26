//! Error types for the ACP client and server.

use thiserror::Error;

/// Primary error type for all ACP operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Property error: {0}")]
    Property(#[from] PropertyError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Firmware error: {0}")]
    Firmware(#[from] FirmwareError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while parsing or composing message frames.
#[derive(Error, Debug)]
pub enum FramingError {
    #[error("Bad header magic")]
    BadMagic,

    #[error("Unknown protocol version: {0:#010x}")]
    UnknownVersion(i32),

    #[error("Header checksum mismatch: expected {expected:#010x}, found {found:#010x}")]
    HeaderChecksum { expected: u32, found: u32 },

    #[error("Body checksum mismatch: expected {expected:#010x}, found {found:#010x}")]
    BodyChecksum { expected: u32, found: u32 },

    #[error("Body length mismatch: header says {expected}, got {found}")]
    BodyLengthMismatch { expected: i32, found: usize },

    #[error("Unknown command: {0:#x}")]
    UnknownCommand(i32),

    #[error("Stream header carries body bytes")]
    StreamHeaderWithBody,

    #[error("Truncated frame: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },
}

/// Errors in property coercion and per-element responses.
#[derive(Error, Debug)]
pub enum PropertyError {
    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Property name must be 4 ASCII bytes: {0:?}")]
    InvalidName(String),

    #[error("Invalid {kind} value: {value}")]
    InvalidValue { kind: &'static str, value: String },

    #[error("Station returned error {0} for property")]
    ServerError(i32),
}

/// Errors in the binary plist payload codec.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("Unsupported plist object marker: {0:#04x}")]
    UnsupportedType(u8),

    #[error("Plist nesting exceeds maximum depth")]
    MaxDepthExceeded,

    #[error("Trailing bytes after plist footer")]
    TrailingGarbage,

    #[error("Missing or malformed plist footer")]
    BadFooter,

    #[error("Missing or malformed plist header")]
    BadHeader,

    #[error("Truncated plist object")]
    Truncated,

    #[error("Plist string is not valid UTF-8")]
    InvalidString,

    #[error("Value not representable in this plist dialect: {0}")]
    Unrepresentable(&'static str),
}

/// Session transport errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session is not connected")]
    NotConnected,

    #[error("Operation timed out")]
    Timeout,

    #[error("Exchange canceled by session close")]
    Canceled,

    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Session encryption is already enabled")]
    EncryptionAlreadyEnabled,

    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors during the SRP authentication exchange.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Server proof did not verify")]
    ProofMismatch,

    #[error("Station rejected the password")]
    IncorrectPassword,

    #[error("Authentication payload is missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid authentication state: {0}")]
    InvalidState(String),

    #[error("Invalid SRP parameter: {0}")]
    InvalidParameter(&'static str),
}

/// RPC exchange errors.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Remote call failed with status {0}")]
    Failed(i32),

    #[error("RPC response is missing status or outputs")]
    InvalidResponse,
}

/// Firmware image codec errors.
#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error("Unknown base station model: {0}")]
    UnknownModel(u32),

    #[error("Image checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    BadChecksum { expected: u32, computed: u32 },

    #[error("Not enough data for a complete image")]
    NotEnoughData,

    #[error("Bad firmware header magic")]
    BadMagic,

    #[error("No compressed payload in image body")]
    NoCompressedPayload,

    #[error("Inflate error: {0}")]
    Inflate(String),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
