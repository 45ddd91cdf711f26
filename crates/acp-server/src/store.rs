//! Pluggable property and RPC backends.

use std::collections::HashMap;

use acp_core::status;
use acp_wire::cflbinary::Value;
use acp_wire::property::PropName;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Backend for property reads and writes.
///
/// Errors are the protocol's per-element status codes, delivered to the
/// client inside error elements.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn get(&self, name: &PropName) -> Result<Vec<u8>, i32>;
    async fn set(&self, name: &PropName, value: Vec<u8>) -> Result<(), i32>;
}

/// Backend for RPC calls: returns the outputs dictionary or a status code.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn call(&self, function: &str, inputs: &Value) -> Result<Value, i32>;
}

/// Volatile key→value store for the test server.
pub struct MemoryStore {
    values: RwLock<HashMap<[u8; 4], Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the store.
    pub async fn insert(&self, name: PropName, value: Vec<u8>) {
        self.values.write().await.insert(name.as_bytes(), value);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn get(&self, name: &PropName) -> Result<Vec<u8>, i32> {
        self.values
            .read()
            .await
            .get(&name.as_bytes())
            .cloned()
            .ok_or(status::NOT_AVAILABLE)
    }

    async fn set(&self, name: &PropName, value: Vec<u8>) -> Result<(), i32> {
        self.values.write().await.insert(name.as_bytes(), value);
        Ok(())
    }
}

/// RPC backend that answers every function with empty outputs.
pub struct NullRpcHandler;

#[async_trait]
impl RpcHandler for NullRpcHandler {
    async fn call(&self, _function: &str, _inputs: &Value) -> Result<Value, i32> {
        Ok(Value::Dict(Vec::new()))
    }
}
