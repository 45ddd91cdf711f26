//! # acp-auth
//!
//! The five-step SRP exchange carried inside AUTHENTICATE messages, for
//! both ends of the connection. Success hands each side the shared secret
//! and the two IVs that parameterize the session encryption layer.

pub mod client;
pub mod payload;
pub mod server;

pub use client::Authenticator;
pub use server::{AuthOutcome, AuthVerifier};

/// The protocol's only user account.
pub const SRP_USERNAME: &str = "admin";
