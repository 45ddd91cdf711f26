//! # acp-server
//!
//! A server speaking the base-station side of ACP: it accepts connections,
//! authenticates the `admin` account over SRP, and serves property reads
//! and writes, RPC, feature queries, and monitor event pushes.
//!
//! Property persistence and the RPC function surface are pluggable via the
//! [`PropertyStore`] and [`RpcHandler`] traits; an in-memory store backs
//! the test server.

pub mod server;
pub mod store;

pub use server::{AcpServer, ServerConfig};
pub use store::{MemoryStore, NullRpcHandler, PropertyStore, RpcHandler};
