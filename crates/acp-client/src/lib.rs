//! # acp-client
//!
//! High-level client for administering a base station over ACP: typed
//! property reads and writes, change monitoring, RPC, feature discovery,
//! firmware flashing, and SRP authentication.

pub mod client;
pub mod config;

pub use client::{AcpClient, MonitorStream, PropertyReply};
pub use config::ClientConfig;
