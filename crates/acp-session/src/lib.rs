//! # acp-session
//!
//! Ordered request/response transport over one TCP socket.
//!
//! A [`Session`] owns the socket exclusively: its write path is the only
//! writer and its read path the only reader. [`SharedSession`] serializes
//! whole exchanges through a fair lock so request/response boundaries never
//! interleave. Once authentication installs an [`EncryptionContext`], every
//! byte in both directions is transparently wrapped.

pub mod encryption;
pub mod session;

pub use encryption::{EncryptionContext, Role};
pub use session::{Session, SessionGuard, SharedSession, DEFAULT_READ_TIMEOUT};
